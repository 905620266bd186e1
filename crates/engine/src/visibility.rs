//! Visibility filtering
//!
//! Pure functions from `(state or delta, viewer role, controlled character)`
//! to what that viewer is allowed to receive. Filtering happens server-side:
//! a restricted viewer is never sent data it is not permitted to see, since
//! client-side hiding is not a security boundary.
//!
//! The game master's view is the identity transform. A player sees:
//! - every map cell, but unrevealed ones only as [`CellStatus::Unknown`]
//!   (distinguishable from "revealed and empty")
//! - combatants that are off-map, in a revealed cell, or their own; a
//!   combatant positioned solely in unrevealed cells is omitted entirely
//!
//! Because filtering depends only on `(state, role, controlled_id)`, the
//! broadcast router evaluates it once per distinct viewer key rather than
//! once per connection.

use battlegrid_domain::{BattleMap, CharacterId, Combatant, CombatantId, GridCell, StateDelta};
use battlegrid_protocol::{CellStatus, CellView, MapView, ParticipantRole, RoomView};

use crate::rooms::RoomStateSnapshot;

/// Build the full room view one viewer is allowed to see
pub fn snapshot_view(
    snapshot: &RoomStateSnapshot,
    role: ParticipantRole,
    controlled_id: Option<CharacterId>,
) -> RoomView {
    let combat = &snapshot.combat;
    let combatants = combat
        .combatants()
        .iter()
        .filter(|c| role.is_game_master() || combatant_visible(c, &snapshot.map, controlled_id))
        .cloned()
        .collect();

    RoomView {
        active: combat.active(),
        round: combat.round(),
        turn_index: combat.turn_index(),
        combatants,
        map: map_view(&snapshot.map, role),
    }
}

/// Filter one delta for one viewer. `None` means the viewer receives nothing.
///
/// `after` is the consistent snapshot taken when the transition completed;
/// position-bearing deltas are translated at the fog boundary into
/// [`StateDelta::CombatantAppeared`] / [`StateDelta::CombatantConcealed`] so
/// a restricted client's roster tracks what it may see.
pub fn delta_view(
    delta: &StateDelta,
    after: &RoomStateSnapshot,
    role: ParticipantRole,
    controlled_id: Option<CharacterId>,
) -> Option<StateDelta> {
    if role.is_game_master() {
        return Some(delta.clone());
    }
    let map = &after.map;
    let visible =
        |combatant: &Combatant| -> bool { combatant_visible(combatant, map, controlled_id) };
    let subject_visible =
        |id| -> bool { after.combat.combatant(id).is_some_and(|c| visible(c)) };
    let own = |id| -> bool {
        after
            .combat
            .combatant(id)
            .and_then(|c| c.character_id())
            .is_some_and(|character| Some(character) == controlled_id)
    };

    match delta {
        StateDelta::CombatStarted {
            round,
            turn_index,
            combatants,
        } => Some(StateDelta::CombatStarted {
            round: *round,
            turn_index: *turn_index,
            combatants: combatants.iter().filter(|c| visible(c)).cloned().collect(),
        }),

        StateDelta::CombatantAdded { combatant, .. } => {
            if visible(combatant) {
                Some(delta.clone())
            } else {
                None
            }
        }

        StateDelta::InitiativeChanged {
            assignments,
            order,
            turn_index,
        } => Some(StateDelta::InitiativeChanged {
            assignments: assignments
                .iter()
                .filter(|a| subject_visible(a.combatant_id))
                .cloned()
                .collect(),
            order: order
                .iter()
                .filter(|id| subject_visible(**id))
                .copied()
                .collect(),
            turn_index: *turn_index,
        }),

        StateDelta::ActionSpent { combatant_id, .. }
        | StateDelta::EconomyReset { combatant_id }
        | StateDelta::ConditionAdded { combatant_id, .. }
        | StateDelta::ConditionRemoved { combatant_id, .. }
        | StateDelta::NpcHitPointsChanged { combatant_id, .. } => {
            if subject_visible(*combatant_id) {
                Some(delta.clone())
            } else {
                None
            }
        }

        StateDelta::MovementUsed {
            combatant_id,
            from,
            to,
            ..
        } => fog_crossing(delta, *combatant_id, *from, *to, map, after, &own),

        StateDelta::MovementUndone {
            combatant_id,
            from,
            position,
            ..
        } => fog_crossing(delta, *combatant_id, *from, *position, map, after, &own),

        // Turn metadata, roster removals and fog changes are global: ids and
        // indices are opaque ordering data, not hidden content
        StateDelta::CombatEnded
        | StateDelta::CombatantRemoved { .. }
        | StateDelta::TurnChanged { .. }
        | StateDelta::CellsRevealed { .. }
        | StateDelta::CellsHidden { .. }
        | StateDelta::CombatantAppeared { .. }
        | StateDelta::CombatantConcealed { .. } => Some(delta.clone()),
    }
}

/// Translate a position change at the fog boundary
fn fog_crossing(
    delta: &StateDelta,
    combatant_id: CombatantId,
    from: Option<GridCell>,
    to: Option<GridCell>,
    map: &BattleMap,
    after: &RoomStateSnapshot,
    own: &dyn Fn(CombatantId) -> bool,
) -> Option<StateDelta> {
    if own(combatant_id) {
        return Some(delta.clone());
    }
    let visible_before = cell_visible(map, from);
    let visible_after = cell_visible(map, to);
    match (visible_before, visible_after) {
        (true, true) => Some(delta.clone()),
        (false, true) => after
            .combat
            .combatant(combatant_id)
            .cloned()
            .map(|combatant| StateDelta::CombatantAppeared { combatant }),
        (true, false) => Some(StateDelta::CombatantConcealed { combatant_id }),
        (false, false) => None,
    }
}

/// A combatant is visible when off-map, in a revealed cell, or controlled by
/// the viewer
fn combatant_visible(
    combatant: &Combatant,
    map: &BattleMap,
    controlled_id: Option<CharacterId>,
) -> bool {
    if combatant
        .character_id()
        .is_some_and(|character| Some(character) == controlled_id)
    {
        return true;
    }
    cell_visible(map, combatant.position)
}

fn cell_visible(map: &BattleMap, cell: Option<GridCell>) -> bool {
    cell.map_or(true, |c| map.is_revealed(c))
}

fn map_view(map: &BattleMap, role: ParticipantRole) -> MapView {
    let fogged = if role.is_game_master() {
        CellStatus::Hidden
    } else {
        CellStatus::Unknown
    };
    let cells = (0..map.height() as i32)
        .flat_map(|y| (0..map.width() as i32).map(move |x| (x, y)))
        .map(|(x, y)| CellView {
            x,
            y,
            status: if map.is_revealed(GridCell::new(x, y)) {
                CellStatus::Revealed
            } else {
                fogged
            },
        })
        .collect();
    MapView {
        width: map.width(),
        height: map.height(),
        cells,
    }
}
