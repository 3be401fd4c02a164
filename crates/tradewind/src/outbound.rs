//! Game effects to messages, one recipient at a time.
//!
//! The same effect can become different messages for different members:
//! hidden resources show up as unknowns, private prompts only go to the
//! seat they are for, and older peers get the legacy encodings
//! ([`PlayerElement`] per element plus [`ResourceCount`], [`GameTextMsg`]
//! instead of [`DeclinePlayerRequest`]).

use std::collections::BTreeMap;

use tradewind_game::{DevCard, Effect, ForcedAction, ResourceSet, ResourceType, Seat};
use tradewind_protocol::{
    CancelBuildRequest, CardAction, ChoosePlayerRequest, DeclinePlayerRequest, DeclineReason,
    DevCardAction, DiceResult, DiscardRequest, ElementAction, FirstPlayer, GameName,
    GameStateMsg, GameTextMsg, Message, MoveRobber, Name, PeerVersion, PlayerElement,
    PlayerElements, PutPiece, ResourceCount, SimpleRequest, SitDown, Text, Turn, element,
    simple,
};

/// Nickname on announcements the server makes itself.
pub const SERVER_NICKNAME: &str = "Server";

/// Who a batch of messages is being built for.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Recipient<'a> {
    /// The member's seat; `None` for observers.
    pub seat: Option<Seat>,
    pub version: &'a PeerVersion,
}

impl Recipient<'_> {
    fn is(&self, seat: Seat) -> bool {
        self.seat == Some(seat)
    }
}

/// Appends what `to` should receive for `effect`. `hands` holds every
/// seat's resource total after the whole batch was applied.
pub(crate) fn render(
    game: &GameName,
    effect: &Effect,
    to: Recipient<'_>,
    hands: &BTreeMap<Seat, i32>,
    out: &mut Vec<Message>,
) {
    let game = game.clone();
    match effect {
        Effect::SatDown {
            seat,
            nickname,
            robot,
        } => {
            if let Ok(nickname) = Name::new(nickname.as_str()) {
                out.push(
                    SitDown {
                        game,
                        nickname,
                        seat: *seat,
                        robot: *robot,
                    }
                    .into(),
                );
            }
        }
        // The game actor announces departures with the member's nickname.
        Effect::LeftSeat { .. } => {}
        Effect::FirstPlayer { seat } => out.push(FirstPlayer { game, seat: *seat }.into()),
        Effect::StateChanged { state } => out.push(GameStateMsg { game, state: *state }.into()),
        Effect::TurnStarted { seat, state } => out.push(
            Turn {
                game,
                seat: *seat,
                state: *state,
            }
            .into(),
        ),
        Effect::DiceRolled { total, .. } => out.push(
            DiceResult {
                game,
                total: i32::from(*total),
            }
            .into(),
        ),
        Effect::Gained {
            seat,
            resources,
            visibility,
        } => resource_change(
            &game,
            *seat,
            ElementAction::Gain,
            resources,
            visibility.reveals_to(to.seat),
            to,
            hands,
            out,
        ),
        Effect::Lost {
            seat,
            resources,
            visibility,
        } => resource_change(
            &game,
            *seat,
            ElementAction::Lose,
            resources,
            visibility.reveals_to(to.seat),
            to,
            hands,
            out,
        ),
        Effect::DiscardRequired { seat, count } => {
            if to.is(*seat) {
                out.push(DiscardRequest { game, count: *count }.into());
            }
        }
        Effect::PickGoldRequired { seat, count } => out.push(
            SimpleRequest {
                game,
                seat: *seat,
                request: simple::PROMPT_PICK_RESOURCES,
                value1: i32::try_from(*count).unwrap_or(i32::MAX),
                value2: 0,
            }
            .into(),
        ),
        // The WAITING_FOR_ROBBER_OR_PIRATE state is the prompt.
        Effect::ChooseRobberOrPirate { .. } => {}
        Effect::RobberMoved { seat, hex, pirate } => {
            let moved = if *pirate {
                MoveRobber::pirate(game, *seat, *hex)
            } else {
                MoveRobber::robber(game, *seat, *hex)
            };
            out.push(moved.into());
        }
        Effect::ChooseVictim { seat, candidates } => {
            if to.is(*seat) {
                out.push(
                    ChoosePlayerRequest {
                        game,
                        candidates: candidates.clone(),
                    }
                    .into(),
                );
            }
        }
        Effect::ChooseClothOrResource { seat, victim } => {
            if to.is(*seat) {
                out.push(
                    ChoosePlayerRequest {
                        game,
                        candidates: vec![*victim],
                    }
                    .into(),
                );
            }
        }
        Effect::Robbed { thief, victim } => out.extend(server_text(
            &game,
            &format!("Seat {} stole a resource from seat {}.", thief.0, victim.0),
        )),
        Effect::ClothStolen { thief, victim } => out.extend(server_text(
            &game,
            &format!("Seat {} stole cloth from seat {}.", thief.0, victim.0),
        )),
        Effect::PiecePlaced { seat, piece, coord } => out.push(
            PutPiece {
                game,
                seat: *seat,
                piece: *piece,
                coord: *coord,
            }
            .into(),
        ),
        Effect::BuildCancelled { piece, .. } => {
            if let Some(piece) = piece {
                out.push(CancelBuildRequest { game, piece: *piece }.into());
            }
        }
        Effect::DevCardDrawn { seat, card } => {
            let card = if to.is(*seat) { *card } else { DevCard::Unknown };
            out.push(
                DevCardAction {
                    game,
                    seat: *seat,
                    action: CardAction::Draw,
                    card,
                }
                .into(),
            );
        }
        Effect::DevCardPlayed { seat, card } => {
            out.push(
                DevCardAction {
                    game: game.clone(),
                    seat: *seat,
                    action: CardAction::Play,
                    card: *card,
                }
                .into(),
            );
            if *card == DevCard::Knight {
                push_elements(
                    &game,
                    *seat,
                    ElementAction::Gain,
                    vec![(element::NUM_KNIGHTS, 1)],
                    to.version,
                    out,
                );
            }
        }
        Effect::Monopolized { seat, rtype, total } => out.extend(server_text(
            &game,
            &format!("Seat {} monopolized {rtype}, taking {total}.", seat.0),
        )),
        Effect::SpecialBuildRequested { seat } => out.extend(server_text(
            &game,
            &format!("Seat {} will build between turns.", seat.0),
        )),
        Effect::Forced(action) => out.extend(server_text(&game, &forced_text(action))),
        Effect::GameOver { winner } => {
            let text = match winner {
                Some(seat) => format!("Seat {} has won the game.", seat.0),
                None => "The game has ended.".to_string(),
            };
            out.extend(server_text(&game, &text));
        }
    }
}

/// What a joining member learns about `seat`'s hand: the owner sees the
/// counts, everyone else only the total.
pub(crate) fn hand_snapshot(
    game: &GameName,
    seat: Seat,
    hand: &ResourceSet,
    to: Recipient<'_>,
    out: &mut Vec<Message>,
) {
    if to.is(seat) {
        let mut elements: Vec<(i32, i32)> = ResourceType::ALL
            .into_iter()
            .map(|r| (r.to_wire(), hand.amount(r)))
            .collect();
        elements.push((element::UNKNOWN, hand.unknown()));
        push_elements(game, seat, ElementAction::Set, elements, to.version, out);
    } else {
        out.push(
            ResourceCount {
                game: game.clone(),
                seat,
                count: hand.total(),
            }
            .into(),
        );
    }
}

/// A refusal, in whichever form `version` understands. `detail` is the
/// game's state rank, or 0 when the game isn't known.
pub(crate) fn decline(
    game: &GameName,
    reason: DeclineReason,
    detail: i32,
    text: &str,
    version: &PeerVersion,
) -> Option<Message> {
    if version.supports_decline() {
        Some(
            DeclinePlayerRequest {
                game: game.clone(),
                reason,
                detail1: detail,
                detail2: 0,
                text: Text::sanitized(text),
            }
            .into(),
        )
    } else {
        server_text(game, text)
    }
}

/// An announcement from the server into a game's chat.
pub(crate) fn server_text(game: &GameName, text: &str) -> Option<Message> {
    let nickname = Name::new(SERVER_NICKNAME).ok()?;
    Some(
        GameTextMsg {
            game: game.clone(),
            nickname,
            text: Text::sanitized(text),
        }
        .into(),
    )
}

#[allow(clippy::too_many_arguments)]
fn resource_change(
    game: &GameName,
    seat: Seat,
    action: ElementAction,
    set: &ResourceSet,
    revealed: bool,
    to: Recipient<'_>,
    hands: &BTreeMap<Seat, i32>,
    out: &mut Vec<Message>,
) {
    let elements = if revealed {
        let mut elements: Vec<(i32, i32)> = set
            .iter_known()
            .filter(|(_, n)| *n > 0)
            .map(|(r, n)| (r.to_wire(), n))
            .collect();
        if set.unknown() > 0 {
            elements.push((element::UNKNOWN, set.unknown()));
        }
        elements
    } else if set.total() > 0 {
        vec![(element::UNKNOWN, set.total())]
    } else {
        Vec::new()
    };
    push_elements(game, seat, action, elements, to.version, out);
    // Legacy peers can't reconcile unknowns on their own.
    if !revealed && !to.version.supports_player_elements() {
        if let Some(count) = hands.get(&seat) {
            out.push(
                ResourceCount {
                    game: game.clone(),
                    seat,
                    count: *count,
                }
                .into(),
            );
        }
    }
}

fn push_elements(
    game: &GameName,
    seat: Seat,
    action: ElementAction,
    elements: Vec<(i32, i32)>,
    version: &PeerVersion,
    out: &mut Vec<Message>,
) {
    if elements.is_empty() {
        return;
    }
    if version.supports_player_elements() {
        out.push(
            PlayerElements {
                game: game.clone(),
                seat,
                action,
                elements,
            }
            .into(),
        );
    } else {
        out.extend(elements.into_iter().map(|(element, amount)| {
            Message::from(PlayerElement {
                game: game.clone(),
                seat,
                action,
                element,
                amount,
            })
        }));
    }
}

fn forced_text(action: &ForcedAction) -> String {
    match action {
        ForcedAction::Discard { seat, count } => {
            format!("Seat {} ran out of time and discarded {count}.", seat.0)
        }
        ForcedAction::PickGold { seat, count } => {
            format!("Seat {} ran out of time and was given {count} resources.", seat.0)
        }
        ForcedAction::SkipPlacement { seat } => {
            format!("Seat {} ran out of time; their placement was skipped.", seat.0)
        }
        ForcedAction::EndTurn { seat, cancelled } => {
            format!("Seat {} ran out of time in {cancelled}; their turn ended.", seat.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tradewind_game::{GameState, Visibility};

    fn game() -> GameName {
        GameName::new("harbor").unwrap()
    }

    fn rendered(effect: &Effect, seat: Option<Seat>, version: &PeerVersion) -> Vec<Message> {
        let hands = BTreeMap::from([(Seat(0), 5), (Seat(1), 3)]);
        let mut out = Vec::new();
        render(&game(), effect, Recipient { seat, version }, &hands, &mut out);
        out
    }

    fn robbery() -> Effect {
        Effect::Gained {
            seat: Seat(0),
            resources: ResourceSet::of(ResourceType::Ore, 1),
            visibility: Visibility::Only(vec![Seat(0), Seat(1)]),
        }
    }

    #[test]
    fn test_render_private_gain_to_party_shows_type() {
        let out = rendered(&robbery(), Some(Seat(1)), &PeerVersion::current());
        assert_eq!(
            out,
            vec![Message::from(PlayerElements {
                game: game(),
                seat: Seat(0),
                action: ElementAction::Gain,
                elements: vec![(ResourceType::Ore.to_wire(), 1)],
            })]
        );
    }

    #[test]
    fn test_render_private_gain_to_outsider_is_unknown() {
        let out = rendered(&robbery(), Some(Seat(2)), &PeerVersion::current());
        assert_eq!(
            out,
            vec![Message::from(PlayerElements {
                game: game(),
                seat: Seat(0),
                action: ElementAction::Gain,
                elements: vec![(element::UNKNOWN, 1)],
            })]
        );
    }

    #[test]
    fn test_render_legacy_outsider_gets_elements_and_count() {
        let out = rendered(&robbery(), None, &PeerVersion::legacy());
        assert_eq!(
            out,
            vec![
                Message::from(PlayerElement {
                    game: game(),
                    seat: Seat(0),
                    action: ElementAction::Gain,
                    element: element::UNKNOWN,
                    amount: 1,
                }),
                Message::from(ResourceCount {
                    game: game(),
                    seat: Seat(0),
                    count: 5,
                }),
            ]
        );
    }

    #[test]
    fn test_render_discard_request_only_to_its_seat() {
        let effect = Effect::DiscardRequired {
            seat: Seat(1),
            count: 4,
        };
        let current = PeerVersion::current();
        assert_eq!(rendered(&effect, Some(Seat(1)), &current).len(), 1);
        assert!(rendered(&effect, Some(Seat(0)), &current).is_empty());
        assert!(rendered(&effect, None, &current).is_empty());
    }

    #[test]
    fn test_render_drawn_card_hidden_from_others() {
        let effect = Effect::DevCardDrawn {
            seat: Seat(0),
            card: DevCard::Monopoly,
        };
        let current = PeerVersion::current();
        let mine = rendered(&effect, Some(Seat(0)), &current);
        let theirs = rendered(&effect, Some(Seat(1)), &current);
        assert!(matches!(&mine[0], Message::DevCardAction(m) if m.card == DevCard::Monopoly));
        assert!(matches!(&theirs[0], Message::DevCardAction(m) if m.card == DevCard::Unknown));
    }

    #[test]
    fn test_decline_falls_back_to_text_for_old_peers() {
        let new = decline(
            &game(),
            DeclineReason::NotYourTurn,
            GameState::Play1.rank(),
            "not your turn",
            &PeerVersion::current(),
        );
        let old = decline(
            &game(),
            DeclineReason::NotYourTurn,
            GameState::Play1.rank(),
            "not your turn",
            &PeerVersion::legacy(),
        );
        assert!(matches!(new, Some(Message::DeclinePlayerRequest(ref m)) if m.detail1 == 20));
        assert!(matches!(old, Some(Message::GameTextMsg(ref m)) if m.nickname.as_str() == SERVER_NICKNAME));
    }

    #[test]
    fn test_hand_snapshot_owner_sees_counts() {
        let hand = ResourceSet::from_counts(1, 0, 2, 0, 0, 0);
        let mut mine = Vec::new();
        hand_snapshot(
            &game(),
            Seat(0),
            &hand,
            Recipient {
                seat: Some(Seat(0)),
                version: &PeerVersion::current(),
            },
            &mut mine,
        );
        let Message::PlayerElements(set) = &mine[0] else {
            panic!("expected PlayerElements, got {mine:?}");
        };
        assert_eq!(set.action, ElementAction::Set);
        assert_eq!(set.elements.len(), 6);

        let mut theirs = Vec::new();
        hand_snapshot(
            &game(),
            Seat(0),
            &hand,
            Recipient {
                seat: Some(Seat(1)),
                version: &PeerVersion::current(),
            },
            &mut theirs,
        );
        assert_eq!(
            theirs,
            vec![Message::from(ResourceCount {
                game: game(),
                seat: Seat(0),
                count: 3,
            })]
        );
    }
}
