//! The line format and typed parameter codec.
//!
//! A message is one line:
//!
//! ```text
//! TYPEID|param1,param2,...
//! ```
//!
//! Game-scoped messages carry the game name as `param1`. A message with no
//! parameters is just its type id. An empty string travels as a single tab
//! so it can't be confused with a missing parameter.
//!
//! Every field type implements [`Param`], so a message is a list of typed
//! fields rather than a hand-written parser: [`ParamWriter`] appends fields
//! in order and [`ParamReader`] takes them back out, reporting arity and
//! type mismatches as [`ProtocolError::Malformed`].

use tradewind_game::{
    DevCard, GameState, MAX_SEATS, PieceKind, ResourceSet, ResourceType, Seat,
};

use crate::error::ProtocolError;
use crate::message::{Message, MessageType};
use crate::text::{GameName, Name, Text};

/// Separates the type id from the parameters.
pub const HEADER_SEP: char = '|';

/// Separates parameters.
pub const PARAM_SEP: char = ',';

/// Stands in for an empty string parameter.
pub const EMPTY_STR: &str = "\t";

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Converts messages to and from lines.
///
/// `Send + Sync + 'static` so one codec can be shared by every reader
/// thread behind an `Arc`.
pub trait Codec: Send + Sync + 'static {
    fn encode(&self, message: &Message) -> String;

    /// Decodes one line. Must never panic on arbitrary input.
    fn decode(&self, line: &str) -> Result<Message, ProtocolError>;
}

// ---------------------------------------------------------------------------
// Writer / reader
// ---------------------------------------------------------------------------

/// Collects encoded parameters for one message.
#[derive(Debug, Default)]
pub struct ParamWriter {
    params: Vec<String>,
}

impl ParamWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put<P: Param>(&mut self, value: &P) -> &mut Self {
        value.write(self);
        self
    }

    pub fn int(&mut self, value: i32) -> &mut Self {
        self.params.push(value.to_string());
        self
    }

    /// Appends a string, substituting the empty-string marker.
    pub fn raw(&mut self, value: &str) -> &mut Self {
        if value.is_empty() {
            self.params.push(EMPTY_STR.to_string());
        } else {
            self.params.push(value.to_string());
        }
        self
    }

    /// Produces the line for a message of type `message`.
    pub fn finish(self, message: MessageType) -> String {
        if self.params.is_empty() {
            message.id().to_string()
        } else {
            let mut line = message.id().to_string();
            line.push(HEADER_SEP);
            line.push_str(&self.params.join(&PARAM_SEP.to_string()));
            line
        }
    }
}

/// Walks the parameters of one incoming line.
#[derive(Debug)]
pub struct ParamReader<'a> {
    message: MessageType,
    parts: Vec<&'a str>,
    pos: usize,
}

impl<'a> ParamReader<'a> {
    /// `params` is everything after the header separator, or `None` if the
    /// line had no separator.
    pub fn new(message: MessageType, params: Option<&'a str>) -> Self {
        let parts = params
            .map(|p| p.split(PARAM_SEP).collect())
            .unwrap_or_default();
        Self {
            message,
            parts,
            pos: 0,
        }
    }

    pub fn message(&self) -> MessageType {
        self.message
    }

    pub fn take<P: Param>(&mut self) -> Result<P, ProtocolError> {
        P::read(self)
    }

    /// The next raw parameter, with the empty-string marker decoded.
    pub fn raw(&mut self) -> Result<&'a str, ProtocolError> {
        let part = self
            .parts
            .get(self.pos)
            .copied()
            .ok_or_else(|| self.malformed(format!("missing parameter {}", self.pos + 1)))?;
        self.pos += 1;
        Ok(if part == EMPTY_STR { "" } else { part })
    }

    pub fn int(&mut self) -> Result<i32, ProtocolError> {
        let raw = self.raw()?;
        raw.parse()
            .map_err(|_| self.malformed(format!("expected a number, got {raw:?}")))
    }

    /// Whether every parameter has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.parts.len()
    }

    /// Fails if parameters are left over.
    pub fn finish(self) -> Result<(), ProtocolError> {
        if self.is_exhausted() {
            Ok(())
        } else {
            Err(self.malformed(format!(
                "{} unexpected trailing parameter(s)",
                self.parts.len() - self.pos
            )))
        }
    }

    pub fn malformed(&self, reason: impl Into<String>) -> ProtocolError {
        ProtocolError::Malformed {
            message: self.message.name(),
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Param
// ---------------------------------------------------------------------------

/// A value that can be a message field.
pub trait Param: Sized {
    fn write(&self, w: &mut ParamWriter);
    fn read(r: &mut ParamReader<'_>) -> Result<Self, ProtocolError>;
}

impl Param for i32 {
    fn write(&self, w: &mut ParamWriter) {
        w.int(*self);
    }

    fn read(r: &mut ParamReader<'_>) -> Result<Self, ProtocolError> {
        r.int()
    }
}

impl Param for u32 {
    fn write(&self, w: &mut ParamWriter) {
        w.raw(&self.to_string());
    }

    fn read(r: &mut ParamReader<'_>) -> Result<Self, ProtocolError> {
        let raw = r.raw()?;
        raw.parse()
            .map_err(|_| r.malformed(format!("expected a count, got {raw:?}")))
    }
}

impl Param for bool {
    fn write(&self, w: &mut ParamWriter) {
        w.raw(if *self { "true" } else { "false" });
    }

    fn read(r: &mut ParamReader<'_>) -> Result<Self, ProtocolError> {
        match r.raw()? {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(r.malformed(format!("expected true/false, got {other:?}"))),
        }
    }
}

macro_rules! text_param {
    ($($ty:ty),*) => {$(
        impl Param for $ty {
            fn write(&self, w: &mut ParamWriter) {
                w.raw(self.as_str());
            }

            fn read(r: &mut ParamReader<'_>) -> Result<Self, ProtocolError> {
                let raw = r.raw()?;
                <$ty>::new(raw).map_err(|e| r.malformed(e.to_string()))
            }
        }
    )*};
}

text_param!(Name, GameName, Text);

impl Param for Seat {
    fn write(&self, w: &mut ParamWriter) {
        w.int(self.to_wire());
    }

    fn read(r: &mut ParamReader<'_>) -> Result<Self, ProtocolError> {
        let value = r.int()?;
        Seat::from_wire(value, MAX_SEATS).ok_or_else(|| r.malformed(format!("bad seat {value}")))
    }
}

/// `None` travels as `-1`.
impl Param for Option<Seat> {
    fn write(&self, w: &mut ParamWriter) {
        w.int(self.map_or(-1, Seat::to_wire));
    }

    fn read(r: &mut ParamReader<'_>) -> Result<Self, ProtocolError> {
        let value = r.int()?;
        if value == -1 {
            return Ok(None);
        }
        Seat::from_wire(value, MAX_SEATS)
            .map(Some)
            .ok_or_else(|| r.malformed(format!("bad seat {value}")))
    }
}

macro_rules! wire_enum_param {
    ($($ty:ty => $what:literal),*) => {$(
        impl Param for $ty {
            fn write(&self, w: &mut ParamWriter) {
                w.int(self.to_wire());
            }

            fn read(r: &mut ParamReader<'_>) -> Result<Self, ProtocolError> {
                let value = r.int()?;
                <$ty>::from_wire(value)
                    .ok_or_else(|| r.malformed(format!(concat!("bad ", $what, " {}"), value)))
            }
        }
    )*};
}

wire_enum_param!(
    PieceKind => "piece type",
    DevCard => "card type",
    ResourceType => "resource type"
);

impl Param for GameState {
    fn write(&self, w: &mut ParamWriter) {
        w.int(self.rank());
    }

    fn read(r: &mut ParamReader<'_>) -> Result<Self, ProtocolError> {
        let value = r.int()?;
        GameState::from_rank(value).ok_or_else(|| r.malformed(format!("bad game state {value}")))
    }
}

/// Six integers: clay, ore, sheep, wheat, wood, unknown.
impl Param for ResourceSet {
    fn write(&self, w: &mut ParamWriter) {
        for value in self.to_wire() {
            w.int(value);
        }
    }

    fn read(r: &mut ParamReader<'_>) -> Result<Self, ProtocolError> {
        let mut values = [0; 6];
        for slot in &mut values {
            *slot = r.int()?;
        }
        ResourceSet::from_wire(values).ok_or_else(|| r.malformed("negative resource count"))
    }
}

/// Two integers.
impl Param for (i32, i32) {
    fn write(&self, w: &mut ParamWriter) {
        w.int(self.0).int(self.1);
    }

    fn read(r: &mut ParamReader<'_>) -> Result<Self, ProtocolError> {
        Ok((r.int()?, r.int()?))
    }
}

/// All remaining parameters. Only valid as a message's last field.
impl<P: Param> Param for Vec<P> {
    fn write(&self, w: &mut ParamWriter) {
        for item in self {
            item.write(w);
        }
    }

    fn read(r: &mut ParamReader<'_>) -> Result<Self, ProtocolError> {
        let mut items = Vec::new();
        while !r.is_exhausted() {
            items.push(P::read(r)?);
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(params: Option<&str>) -> ParamReader<'_> {
        ParamReader::new(MessageType::DISCARD, params)
    }

    #[test]
    fn test_writer_without_params_is_bare_type_id() {
        assert_eq!(ParamWriter::new().finish(MessageType::LEAVEALL), "1008");
    }

    #[test]
    fn test_writer_marks_empty_strings() {
        let mut w = ParamWriter::new();
        w.raw("").int(3);
        assert_eq!(w.finish(MessageType::DISCARD), "1033|\t,3");
    }

    #[test]
    fn test_reader_decodes_empty_marker() {
        let mut r = reader(Some("\t,3"));
        assert_eq!(r.raw().unwrap(), "");
        assert_eq!(r.int().unwrap(), 3);
        assert!(r.finish().is_ok());
    }

    #[test]
    fn test_reader_missing_parameter_is_malformed() {
        let mut r = reader(None);
        assert!(matches!(r.int(), Err(ProtocolError::Malformed { .. })));
    }

    #[test]
    fn test_reader_trailing_parameters_rejected() {
        let mut r = reader(Some("1,2"));
        r.int().unwrap();
        assert!(r.finish().is_err());
    }

    #[test]
    fn test_resource_set_rejects_negative_known() {
        let mut r = reader(Some("1,-1,0,0,0,0"));
        assert!(ResourceSet::read(&mut r).is_err());
    }

    #[test]
    fn test_option_seat_uses_minus_one() {
        let mut w = ParamWriter::new();
        w.put(&None::<Seat>).put(&Some(Seat(3)));
        assert_eq!(w.finish(MessageType::DISCARD), "1033|-1,3");
        let mut r = reader(Some("-1,3,9"));
        assert_eq!(Option::<Seat>::read(&mut r).unwrap(), None);
        assert_eq!(Option::<Seat>::read(&mut r).unwrap(), Some(Seat(3)));
        assert!(Option::<Seat>::read(&mut r).is_err());
    }

    #[test]
    fn test_bool_is_strict() {
        let mut r = reader(Some("true,1"));
        assert!(bool::read(&mut r).unwrap());
        assert!(bool::read(&mut r).is_err());
    }
}
