//! Inbound message dispatch
//!
//! Resolves external lookups (character summaries, catalog defaults), hands
//! the resulting command to the room for the atomic authorize-and-apply, and
//! pushes the delta to the broadcast router. Rejections come back as an
//! `Error` message for the originating connection only; nothing is ever
//! broadcast for a failed action.

use chrono::Utc;
use uuid::Uuid;

use battlegrid_domain::{ActionSlot, CharacterId, Combatant, Condition, ConditionDuration, RoomId};
use battlegrid_protocol::{ClientMessage, CombatAction, HpChangeKind, ServerMessage};

use crate::app::App;
use crate::error::EngineError;
use crate::ports::AccessClaims;
use crate::rooms::{Actor, RoomCommand};

/// Per-connection context threaded through message handling
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    pub connection_id: Uuid,
    pub room_id: RoomId,
    pub claims: AccessClaims,
}

impl ConnectionContext {
    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.claims.user_id,
            role: self.claims.role,
            controlled_id: self.claims.controlled_id,
        }
    }
}

/// Handle one parsed client message. The return value, if any, goes back to
/// the originating connection only.
pub async fn handle_message(
    app: &App,
    ctx: &ConnectionContext,
    msg: ClientMessage,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::Heartbeat => Some(ServerMessage::Pong),

        ClientMessage::Chat { message, whisper } => {
            let outbound = ServerMessage::ChatMessage {
                username: ctx.claims.username.clone(),
                message,
                whisper,
                timestamp: Utc::now(),
            };
            if whisper {
                app.router
                    .publish_targeted(ctx.room_id, &outbound, ctx.claims.user_id)
                    .await;
            } else {
                app.router.publish_message(ctx.room_id, &outbound).await;
            }
            None
        }

        ClientMessage::DiceRoll {
            spec,
            character_name,
            label,
            whisper,
        } => {
            let spec = match spec.validate() {
                Ok(spec) => spec,
                Err(e) => return Some(error_message(EngineError::from(e))),
            };
            let outcome = spec.roll(|sides| app.dice.roll(sides));
            tracing::debug!(
                user = %ctx.claims.username,
                total = outcome.total,
                whisper,
                "Dice roll"
            );
            let outbound = ServerMessage::DiceResult {
                username: ctx.claims.username.clone(),
                character_name,
                outcome,
                label,
                whisper,
                timestamp: Utc::now(),
            };
            if whisper {
                app.router
                    .publish_targeted(ctx.room_id, &outbound, ctx.claims.user_id)
                    .await;
            } else {
                app.router.publish_message(ctx.room_id, &outbound).await;
            }
            None
        }

        ClientMessage::CombatAction { action } => {
            match handle_combat_action(app, ctx, action).await {
                Ok(()) => None,
                Err(e) => Some(error_message(e)),
            }
        }
    }
}

async fn handle_combat_action(
    app: &App,
    ctx: &ConnectionContext,
    action: CombatAction,
) -> Result<(), EngineError> {
    let command = resolve_command(app, action).await?;
    let room = app.rooms.get(ctx.room_id).ok_or(EngineError::RoomGone)?;
    let (delta, snapshot) = room.apply(command, &ctx.actor()).await?;
    app.router
        .publish_delta(ctx.room_id, &delta, &snapshot)
        .await;
    Ok(())
}

/// Translate the wire action into a fully resolved room command.
/// All port I/O happens here, before the room lock is taken.
async fn resolve_command(app: &App, action: CombatAction) -> Result<RoomCommand, EngineError> {
    Ok(match action {
        CombatAction::StartCombat { character_ids } => {
            let mut roster = Vec::with_capacity(character_ids.len());
            for character_id in character_ids {
                roster.push(player_combatant(app, character_id).await?);
            }
            RoomCommand::StartCombat { roster }
        }

        CombatAction::EndCombat => RoomCommand::EndCombat,

        CombatAction::AddCombatant {
            name,
            initiative,
            character_id,
            creature,
            position,
        } => {
            let mut combatant = match character_id {
                Some(character_id) => player_combatant(app, character_id).await?,
                None => {
                    let defaults = match app
                        .catalog
                        .npc_defaults(creature.as_deref().unwrap_or(&name))
                        .await
                    {
                        Some(defaults) => defaults,
                        None => crate::ports::NpcDefaults {
                            stats: battlegrid_domain::StatBlock::commoner(),
                            speed: 30,
                        },
                    };
                    Combatant::npc(name, defaults.stats, defaults.speed)
                }
            };
            if let Some(value) = initiative {
                combatant = combatant.with_initiative(value);
            }
            if let Some(cell) = position {
                combatant = combatant.at(cell);
            }
            RoomCommand::AddCombatant { combatant }
        }

        CombatAction::RemoveCombatant { combatant_id } => {
            RoomCommand::RemoveCombatant { combatant_id }
        }
        CombatAction::SetInitiative {
            combatant_id,
            value,
        } => RoomCommand::SetInitiative {
            combatant_id,
            value,
        },
        CombatAction::RollInitiative { combatant_id } => {
            RoomCommand::RollInitiative { combatant_id }
        }
        CombatAction::RollAll => RoomCommand::RollAll,
        CombatAction::NextTurn => RoomCommand::NextTurn,
        CombatAction::PreviousTurn => RoomCommand::PreviousTurn,
        CombatAction::UseAction { combatant_id } => RoomCommand::Spend {
            combatant_id,
            slot: ActionSlot::Action,
        },
        CombatAction::UseBonusAction { combatant_id } => RoomCommand::Spend {
            combatant_id,
            slot: ActionSlot::BonusAction,
        },
        CombatAction::UseReaction { combatant_id } => RoomCommand::Spend {
            combatant_id,
            slot: ActionSlot::Reaction,
        },
        CombatAction::UseMovement {
            combatant_id,
            feet,
            to,
        } => RoomCommand::UseMovement {
            combatant_id,
            feet,
            to,
        },
        CombatAction::UndoMovement { combatant_id } => RoomCommand::UndoMovement { combatant_id },
        CombatAction::ResetActionEconomy { combatant_id } => {
            RoomCommand::ResetActionEconomy { combatant_id }
        }

        CombatAction::AddCondition {
            combatant_id,
            name,
            duration,
            source,
        } => {
            let duration = match duration {
                Some(duration) => duration,
                None => app
                    .catalog
                    .condition_defaults(&name)
                    .await
                    .unwrap_or(ConditionDuration::Indefinite),
            };
            let mut condition = Condition::new(name, duration);
            condition.source = source;
            RoomCommand::AddCondition {
                combatant_id,
                condition,
            }
        }

        CombatAction::RemoveCondition { combatant_id, name } => {
            RoomCommand::RemoveCondition { combatant_id, name }
        }

        CombatAction::AdjustHitPoints {
            combatant_id,
            change,
            amount,
        } => {
            let signed = match change {
                HpChangeKind::Damage => -(amount as i32),
                HpChangeKind::Healing => amount as i32,
            };
            RoomCommand::AdjustHitPoints {
                combatant_id,
                change: signed,
            }
        }

        CombatAction::RevealCells { cells } => RoomCommand::RevealCells { cells },
        CombatAction::HideCells { cells } => RoomCommand::HideCells { cells },
    })
}

/// Build a player-controlled combatant from the character store summary
async fn player_combatant(app: &App, character_id: CharacterId) -> Result<Combatant, EngineError> {
    let summary = app
        .characters
        .controlled_summary(character_id)
        .await
        .map_err(|e| EngineError::Store(e.to_string()))?
        .ok_or(EngineError::CharacterNotFound(character_id))?;
    Ok(Combatant::player(
        summary.name,
        character_id,
        summary.owner,
        summary.speed,
    ))
}

fn error_message(error: EngineError) -> ServerMessage {
    ServerMessage::Error {
        code: error.code(),
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use battlegrid_domain::{GridCell, StateDelta};
    use battlegrid_protocol::{ErrorCode, ParticipantRole};
    use serde_json::json;

    use crate::ports::CharacterSummary;
    use crate::test_support::{join_room, test_app};

    fn ctx(connection: &crate::test_support::TestConnection, claims_name: &str) -> ConnectionContext {
        ConnectionContext {
            connection_id: connection.info.connection_id,
            room_id: connection.info.room_id,
            claims: AccessClaims {
                user_id: connection.info.user_id,
                username: claims_name.to_string(),
                role: connection.info.role,
                controlled_id: connection.info.controlled_id,
            },
        }
    }

    fn parse(raw: serde_json::Value) -> ClientMessage {
        serde_json::from_value(raw).expect("valid client message")
    }

    #[tokio::test]
    async fn test_start_combat_broadcasts_to_room() {
        let (app, characters) = test_app(11);
        let room_id = RoomId::new();
        let character_id = CharacterId::new();

        let gm = join_room(&app, room_id, ParticipantRole::GameMaster, None).await;
        let mut player =
            join_room(&app, room_id, ParticipantRole::Player, Some(character_id)).await;
        characters
            .insert(
                character_id,
                CharacterSummary {
                    name: "Aragorn".to_string(),
                    owner: player.info.user_id,
                    hit_points: 40,
                    max_hit_points: 40,
                    armor_class: 16,
                    speed: 30,
                },
            )
            .await;

        let msg = parse(json!({
            "type": "combat_action",
            "action": {
                "action": "start_combat",
                "data": {"character_ids": [character_id.to_uuid()]}
            }
        }));
        let reply = handle_message(&app, &ctx(&gm, "gm"), msg).await;
        assert!(reply.is_none());

        let received = player.drain();
        match received.as_slice() {
            [ServerMessage::CombatUpdate {
                delta: StateDelta::CombatStarted { combatants, .. },
            }] => {
                assert_eq!(combatants.len(), 1);
                assert_eq!(combatants[0].name, "Aragorn");
            }
            other => panic!("unexpected messages: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_character_reports_not_found_to_origin_only() {
        let (app, _) = test_app(11);
        let room_id = RoomId::new();
        let gm = join_room(&app, room_id, ParticipantRole::GameMaster, None).await;
        let mut bystander = join_room(&app, room_id, ParticipantRole::Player, None).await;

        let msg = parse(json!({
            "type": "combat_action",
            "action": {
                "action": "start_combat",
                "data": {"character_ids": [uuid::Uuid::new_v4()]}
            }
        }));
        let reply = handle_message(&app, &ctx(&gm, "gm"), msg).await;
        match reply {
            Some(ServerMessage::Error { code, .. }) => assert_eq!(code, ErrorCode::NotFound),
            other => panic!("unexpected reply: {other:?}"),
        }
        assert!(bystander.drain().is_empty());
    }

    #[tokio::test]
    async fn test_player_rejected_for_gm_action() {
        let (app, _) = test_app(11);
        let room_id = RoomId::new();
        let player = join_room(&app, room_id, ParticipantRole::Player, None).await;

        let msg = parse(json!({
            "type": "combat_action",
            "action": {
                "action": "reveal_cells",
                "data": {"cells": [{"x": 1, "y": 1}]}
            }
        }));
        let reply = handle_message(&app, &ctx(&player, "liam"), msg).await;
        match reply {
            Some(ServerMessage::Error { code, .. }) => assert_eq!(code, ErrorCode::Unauthorized),
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_add_npc_resolves_catalog_stats() {
        let (app, _) = test_app(11);
        let room_id = RoomId::new();
        let mut gm = join_room(&app, room_id, ParticipantRole::GameMaster, None).await;

        let msg = parse(json!({
            "type": "combat_action",
            "action": {
                "action": "add_combatant",
                "data": {"name": "Grik", "creature": "goblin", "initiative": 15}
            }
        }));
        assert!(handle_message(&app, &ctx(&gm, "gm"), msg).await.is_none());

        match gm.drain().as_slice() {
            [ServerMessage::CombatUpdate {
                delta: StateDelta::CombatantAdded { combatant, .. },
            }] => {
                assert_eq!(combatant.name, "Grik");
                assert_eq!(combatant.initiative, Some(15));
                match &combatant.kind {
                    battlegrid_domain::CombatantKind::Npc { stats } => {
                        assert_eq!(stats.max_hit_points, 7);
                    }
                    other => panic!("unexpected kind: {other:?}"),
                }
            }
            other => panic!("unexpected messages: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_whispered_roll_skips_bystander() {
        let (app, _) = test_app(17);
        let room_id = RoomId::new();
        let mut gm = join_room(&app, room_id, ParticipantRole::GameMaster, None).await;
        let mut roller = join_room(&app, room_id, ParticipantRole::Player, None).await;
        let mut bystander = join_room(&app, room_id, ParticipantRole::Player, None).await;

        let msg = parse(json!({
            "type": "dice_roll",
            "num_dice": 1,
            "die_size": 20,
            "modifier": 2,
            "whisper": true,
            "label": "Stealth check"
        }));
        assert!(handle_message(&app, &ctx(&roller, "liam"), msg)
            .await
            .is_none());

        match gm.drain().as_slice() {
            [ServerMessage::DiceResult { outcome, whisper, .. }] => {
                assert_eq!(outcome.total, 19);
                assert!(*whisper);
            }
            other => panic!("unexpected messages: {other:?}"),
        }
        assert_eq!(roller.drain().len(), 1);
        assert!(bystander.drain().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_die_size_rejected() {
        let (app, _) = test_app(1);
        let room_id = RoomId::new();
        let player = join_room(&app, room_id, ParticipantRole::Player, None).await;

        let msg = parse(json!({
            "type": "dice_roll",
            "num_dice": 1,
            "die_size": 7,
            "modifier": 0
        }));
        let reply = handle_message(&app, &ctx(&player, "liam"), msg).await;
        match reply {
            Some(ServerMessage::Error { code, .. }) => assert_eq!(code, ErrorCode::InvalidRoll),
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_character_store_failure_maps_to_internal_error() {
        use std::sync::Arc;

        use crate::app::{App, EngineConfig};
        use crate::ports::{DevTokenVerifier, MockCharacterStore, StaticCatalog, StoreError};
        use crate::test_support::FixedDice;

        let mut store = MockCharacterStore::new();
        store
            .expect_controlled_summary()
            .returning(|_| Err(StoreError::Unavailable("connection refused".into())));
        let app = Arc::new(App::new(
            EngineConfig::default(),
            Arc::new(store),
            Arc::new(StaticCatalog),
            Arc::new(DevTokenVerifier),
            Arc::new(FixedDice(1)),
        ));

        let room_id = RoomId::new();
        let gm = join_room(&app, room_id, ParticipantRole::GameMaster, None).await;
        let msg = parse(json!({
            "type": "combat_action",
            "action": {
                "action": "start_combat",
                "data": {"character_ids": [uuid::Uuid::new_v4()]}
            }
        }));
        let reply = handle_message(&app, &ctx(&gm, "gm"), msg).await;
        match reply {
            Some(ServerMessage::Error { code, .. }) => assert_eq!(code, ErrorCode::InternalError),
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fogged_movement_invisible_to_player() {
        let (app, _) = test_app(11);
        let room_id = RoomId::new();
        let mut gm = join_room(&app, room_id, ParticipantRole::GameMaster, None).await;
        let mut player = join_room(&app, room_id, ParticipantRole::Player, None).await;
        let gm_ctx = ctx(&gm, "gm");

        // Stage and start with one fogged goblin
        let add = parse(json!({
            "type": "combat_action",
            "action": {
                "action": "add_combatant",
                "data": {"name": "Goblin", "position": {"x": 9, "y": 9}}
            }
        }));
        handle_message(&app, &gm_ctx, add).await;
        let start = parse(json!({
            "type": "combat_action",
            "action": {"action": "start_combat", "data": {}}
        }));
        handle_message(&app, &gm_ctx, start).await;

        let goblin_id = match gm.drain().as_slice() {
            [ServerMessage::CombatUpdate {
                delta: StateDelta::CombatantAdded { combatant, .. },
            }, ServerMessage::CombatUpdate { .. }] => combatant.id,
            other => panic!("unexpected messages: {other:?}"),
        };
        // The player saw neither the add nor the fogged combatant in the start
        let player_start = player.drain();
        match player_start.as_slice() {
            [ServerMessage::CombatUpdate {
                delta: StateDelta::CombatStarted { combatants, .. },
            }] => assert!(combatants.is_empty()),
            other => panic!("unexpected messages: {other:?}"),
        }

        // Moving within fog stays invisible
        let movement = parse(json!({
            "type": "combat_action",
            "action": {
                "action": "use_movement",
                "data": {"combatant_id": goblin_id.to_uuid(), "feet": 5, "to": {"x": 10, "y": 9}}
            }
        }));
        handle_message(&app, &gm_ctx, movement).await;
        assert_eq!(gm.drain().len(), 1);
        assert!(player.drain().is_empty());
    }

    #[tokio::test]
    async fn test_reveal_cells_surfaces_occupants_to_player() {
        let (app, _) = test_app(11);
        let room_id = RoomId::new();
        let mut gm = join_room(&app, room_id, ParticipantRole::GameMaster, None).await;
        let mut player = join_room(&app, room_id, ParticipantRole::Player, None).await;
        let gm_ctx = ctx(&gm, "gm");

        let add = parse(json!({
            "type": "combat_action",
            "action": {
                "action": "add_combatant",
                "data": {"name": "Lurker", "position": {"x": 3, "y": 3}}
            }
        }));
        handle_message(&app, &gm_ctx, add).await;
        player.drain();
        gm.drain();

        let reveal = parse(json!({
            "type": "combat_action",
            "action": {
                "action": "reveal_cells",
                "data": {"cells": [{"x": 3, "y": 3}]}
            }
        }));
        handle_message(&app, &gm_ctx, reveal).await;

        match player.drain().as_slice() {
            [ServerMessage::CombatUpdate {
                delta: StateDelta::CellsRevealed { cells, combatants },
            }] => {
                assert_eq!(cells, &vec![GridCell::new(3, 3)]);
                assert_eq!(combatants.len(), 1);
                assert_eq!(combatants[0].name, "Lurker");
            }
            other => panic!("unexpected messages: {other:?}"),
        }
    }
}
