//! Routing by message type.
//!
//! Each type id maps to a [`Route`]: handle it on the reader thread, hand it
//! to a queue, or drop it. Anything not listed takes the table's default,
//! which is [`Route::Drop`] unless changed.

use std::collections::HashMap;

use tradewind_protocol::{Message, MessageType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Handle synchronously on the reader thread.
    Direct,
    /// Deposit into the consumer's capped queue.
    Queue,
    /// Ignore without error.
    Drop,
}

#[derive(Debug, Clone)]
pub struct RoutingTable {
    routes: HashMap<i32, Route>,
    default: Route,
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self {
            routes: HashMap::new(),
            default: Route::Drop,
        }
    }
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(mut self, route: Route) -> Self {
        self.default = route;
        self
    }

    pub fn set(mut self, types: &[MessageType], route: Route) -> Self {
        for t in types {
            self.routes.insert(t.id(), route);
        }
        self
    }

    pub fn direct(self, types: &[MessageType]) -> Self {
        self.set(types, Route::Direct)
    }

    pub fn queue(self, types: &[MessageType]) -> Self {
        self.set(types, Route::Queue)
    }

    pub fn route(&self, message: MessageType) -> Route {
        self.routes
            .get(&message.id())
            .copied()
            .unwrap_or(self.default)
    }

    pub fn route_of(&self, message: &Message) -> Route {
        self.route(message.message_type())
    }

    /// The table a robot client uses: connection-level messages are handled
    /// on the reader thread, game traffic goes to the game's queue, the
    /// rest is dropped.
    pub fn robot() -> Self {
        Self::new()
            .direct(&[
                MessageType::VERSION,
                MessageType::STATUSMESSAGE,
                MessageType::REJECTCONNECTION,
                MessageType::SERVERPING,
                MessageType::JOINGAMEAUTH,
                MessageType::DELETEGAME,
            ])
            .queue(&[
                MessageType::GAMEMEMBERS,
                MessageType::LEAVEGAME,
                MessageType::SITDOWN,
                MessageType::STARTGAME,
                MessageType::GAMESTATE,
                MessageType::TURN,
                MessageType::FIRSTPLAYER,
                MessageType::PUTPIECE,
                MessageType::CANCELBUILDREQUEST,
                MessageType::DICERESULT,
                MessageType::DISCARDREQUEST,
                MessageType::MOVEROBBER,
                MessageType::CHOOSEPLAYERREQUEST,
                MessageType::DEVCARDACTION,
                MessageType::PLAYERELEMENT,
                MessageType::PLAYERELEMENTS,
                MessageType::RESOURCECOUNT,
                MessageType::PICKRESOURCES,
                MessageType::GAMETEXTMSG,
                MessageType::SIMPLEREQUEST,
                MessageType::DECLINEPLAYERREQUEST,
            ])
    }

    /// The table a server uses: session messages are handled on the reader
    /// thread, requests for a game go to that game's queue.
    pub fn server() -> Self {
        Self::new()
            .direct(&[
                MessageType::VERSION,
                MessageType::IMAROBOT,
                MessageType::JOINGAME,
                MessageType::LEAVEGAME,
                MessageType::LEAVEALL,
                MessageType::SERVERPING,
            ])
            .queue(&[
                MessageType::SITDOWN,
                MessageType::STARTGAME,
                MessageType::PUTPIECE,
                MessageType::BUILDREQUEST,
                MessageType::CANCELBUILDREQUEST,
                MessageType::ROLLDICE,
                MessageType::DISCARD,
                MessageType::MOVEROBBER,
                MessageType::CHOOSEPLAYER,
                MessageType::ENDTURN,
                MessageType::BUYDEVCARDREQUEST,
                MessageType::PLAYDEVCARDREQUEST,
                MessageType::PICKRESOURCES,
                MessageType::PICKRESOURCETYPE,
                MessageType::GAMETEXTMSG,
                MessageType::SIMPLEREQUEST,
            ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlisted_types_drop_by_default() {
        let table = RoutingTable::new().direct(&[MessageType::VERSION]);
        assert_eq!(table.route(MessageType::VERSION), Route::Direct);
        assert_eq!(table.route(MessageType::TURN), Route::Drop);
        assert_eq!(
            table.with_default(Route::Queue).route(MessageType::TURN),
            Route::Queue
        );
    }

    #[test]
    fn test_robot_table() {
        let table = RoutingTable::robot();
        assert_eq!(table.route(MessageType::JOINGAMEAUTH), Route::Direct);
        assert_eq!(table.route(MessageType::GAMESTATE), Route::Queue);
        assert_eq!(table.route(MessageType::GAMES), Route::Drop);
        assert_eq!(table.route(MessageType::ROLLDICE), Route::Drop);
    }

    #[test]
    fn test_server_table() {
        let table = RoutingTable::server();
        assert_eq!(table.route(MessageType::JOINGAME), Route::Direct);
        assert_eq!(table.route(MessageType::ROLLDICE), Route::Queue);
        assert_eq!(table.route(MessageType::GAMESTATE), Route::Drop);
    }
}
