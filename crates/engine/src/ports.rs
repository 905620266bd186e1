//! Collaborator ports
//!
//! The engine owns combat state and nothing else. Character sheets, reference
//! data, token verification and randomness are consumed through these traits
//! so the core stays testable and the collaborators swappable. The in-tree
//! implementations cover development and tests; a deployment wires real ones.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use battlegrid_domain::{CharacterId, ConditionDuration, StatBlock, UserId};
use battlegrid_protocol::ParticipantRole;

/// Combat-relevant summary of an externally stored character.
///
/// Read once when a player-controlled combatant is added; the engine never
/// owns or writes the full character record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterSummary {
    pub name: String,
    pub owner: UserId,
    pub hit_points: i32,
    pub max_hit_points: i32,
    pub armor_class: i32,
    pub speed: u32,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("character store unavailable: {0}")]
    Unavailable(String),
}

/// Read-only access to the external character store
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CharacterStore: Send + Sync {
    async fn controlled_summary(
        &self,
        id: CharacterId,
    ) -> Result<Option<CharacterSummary>, StoreError>;
}

/// Default stats for an independent combatant added by creature name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NpcDefaults {
    pub stats: StatBlock,
    pub speed: u32,
}

/// Read-only reference data lookup (creatures, conditions).
///
/// The engine stores the resolved values, not a reference, so later catalog
/// edits never retroactively change in-flight combat.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn npc_defaults(&self, name: &str) -> Option<NpcDefaults>;
    async fn condition_defaults(&self, name: &str) -> Option<ConditionDuration>;
}

/// Verified identity and capability of a connecting client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessClaims {
    pub user_id: UserId,
    pub username: String,
    pub role: ParticipantRole,
    /// The character this participant controls, if any
    pub controlled_id: Option<CharacterId>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid or expired token")]
    Invalid,
}

/// Verifies the capability token presented at connection time.
/// Token issuance belongs to the external auth service.
#[async_trait]
pub trait AccessTokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<AccessClaims, TokenError>;
}

/// Die rolling behind a trait so initiative and dice results are
/// deterministic under test
pub trait DiceRoller: Send + Sync {
    /// Roll one die, returning a value in `1..=sides`
    fn roll(&self, sides: u32) -> u32;
}

// =============================================================================
// In-tree implementations
// =============================================================================

/// Thread-rng backed dice
pub struct SystemDice;

impl DiceRoller for SystemDice {
    fn roll(&self, sides: u32) -> u32 {
        use rand::Rng;
        rand::thread_rng().gen_range(1..=sides.max(1))
    }
}

/// In-memory character store for development and tests
#[derive(Default)]
pub struct InMemoryCharacterStore {
    characters: RwLock<HashMap<CharacterId, CharacterSummary>>,
}

impl InMemoryCharacterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, id: CharacterId, summary: CharacterSummary) {
        self.characters.write().await.insert(id, summary);
    }
}

#[async_trait]
impl CharacterStore for InMemoryCharacterStore {
    async fn controlled_summary(
        &self,
        id: CharacterId,
    ) -> Result<Option<CharacterSummary>, StoreError> {
        Ok(self.characters.read().await.get(&id).cloned())
    }
}

/// Built-in SRD-flavored creature and condition defaults
pub struct StaticCatalog;

#[async_trait]
impl Catalog for StaticCatalog {
    async fn npc_defaults(&self, name: &str) -> Option<NpcDefaults> {
        let entry = |hp: i32, ac: i32, attack: i32, speed: u32| NpcDefaults {
            stats: StatBlock {
                hit_points: hp,
                max_hit_points: hp,
                armor_class: ac,
                attack_bonus: attack,
            },
            speed,
        };
        match name.to_lowercase().as_str() {
            "goblin" => Some(entry(7, 15, 4, 30)),
            "orc" => Some(entry(15, 13, 5, 30)),
            "skeleton" => Some(entry(13, 13, 4, 30)),
            "zombie" => Some(entry(22, 8, 3, 20)),
            "wolf" => Some(entry(11, 13, 4, 40)),
            "bandit" => Some(entry(11, 12, 3, 30)),
            "ogre" => Some(entry(59, 11, 6, 40)),
            _ => None,
        }
    }

    async fn condition_defaults(&self, name: &str) -> Option<ConditionDuration> {
        // The standard condition list is indefinite by default; only a few
        // common spell effects carry a round count.
        match name.to_lowercase().as_str() {
            "blinded" | "charmed" | "deafened" | "frightened" | "grappled" | "incapacitated"
            | "invisible" | "paralyzed" | "petrified" | "poisoned" | "prone" | "restrained"
            | "stunned" | "unconscious" | "exhaustion" => Some(ConditionDuration::Indefinite),
            "blessed" | "shield of faith" => Some(ConditionDuration::Concentration),
            _ => None,
        }
    }
}

/// Development token verifier.
///
/// Accepts `gm:<user_uuid>:<username>` and
/// `player:<user_uuid>:<username>[:<character_uuid>]`. A real deployment
/// substitutes a verifier for the auth service's signed tokens; the engine
/// only ever sees this trait.
pub struct DevTokenVerifier;

#[async_trait]
impl AccessTokenVerifier for DevTokenVerifier {
    async fn verify(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let parts: Vec<&str> = token.split(':').collect();
        let (role, rest) = match parts.as_slice() {
            ["gm", rest @ ..] => (ParticipantRole::GameMaster, rest),
            ["player", rest @ ..] => (ParticipantRole::Player, rest),
            _ => return Err(TokenError::Invalid),
        };
        let (user_raw, username, controlled_raw) = match rest {
            [user, name] => (*user, *name, None),
            [user, name, character] => (*user, *name, Some(*character)),
            _ => return Err(TokenError::Invalid),
        };
        if username.is_empty() {
            return Err(TokenError::Invalid);
        }
        let user_id = Uuid::parse_str(user_raw)
            .map(UserId::from_uuid)
            .map_err(|_| TokenError::Invalid)?;
        let controlled_id = match controlled_raw {
            Some(raw) => Some(
                Uuid::parse_str(raw)
                    .map(CharacterId::from_uuid)
                    .map_err(|_| TokenError::Invalid)?,
            ),
            None => None,
        };
        if role.is_game_master() && controlled_id.is_some() {
            return Err(TokenError::Invalid);
        }
        Ok(AccessClaims {
            user_id,
            username: username.to_string(),
            role,
            controlled_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dev_token_gm() {
        let user = Uuid::new_v4();
        let claims = DevTokenVerifier
            .verify(&format!("gm:{user}:Matt"))
            .await
            .expect("valid token");
        assert_eq!(claims.role, ParticipantRole::GameMaster);
        assert_eq!(claims.username, "Matt");
        assert!(claims.controlled_id.is_none());
    }

    #[tokio::test]
    async fn test_dev_token_player_with_character() {
        let user = Uuid::new_v4();
        let character = Uuid::new_v4();
        let claims = DevTokenVerifier
            .verify(&format!("player:{user}:Liam:{character}"))
            .await
            .expect("valid token");
        assert_eq!(claims.role, ParticipantRole::Player);
        assert_eq!(
            claims.controlled_id,
            Some(CharacterId::from_uuid(character))
        );
    }

    #[tokio::test]
    async fn test_dev_token_rejects_garbage() {
        assert_eq!(
            DevTokenVerifier.verify("not-a-token").await,
            Err(TokenError::Invalid)
        );
        assert_eq!(
            DevTokenVerifier.verify("gm:not-a-uuid:Matt").await,
            Err(TokenError::Invalid)
        );
    }

    #[tokio::test]
    async fn test_static_catalog_lookup() {
        let goblin = StaticCatalog.npc_defaults("Goblin").await.expect("goblin");
        assert_eq!(goblin.stats.max_hit_points, 7);
        assert!(StaticCatalog.npc_defaults("tarrasque jr").await.is_none());
    }

    #[test]
    fn test_system_dice_in_range() {
        for _ in 0..200 {
            let roll = SystemDice.roll(20);
            assert!((1..=20).contains(&roll));
        }
    }
}
