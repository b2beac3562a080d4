use ahash::RandomState;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{BuildHasher, Hasher};

/// Arena index of a player in the world store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub u16);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identifier of a structure or projectile. Never reused within a game.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub u32);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle into the world grid (`y * width + x`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileRef(pub u32);

impl fmt::Display for TileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum UnitKind {
    City = 0,
    Port = 1,
    Factory = 2,
    DefensePost = 3,
    MissileSilo = 4,
    SamLauncher = 5,
    Warship = 6,
    TransportShip = 7,
    AtomBomb = 8,
    HydrogenBomb = 9,
    Mirv = 10,
    MirvWarhead = 11,
    SamMissile = 12,
}

impl UnitKind {
    pub const STRUCTURES: [UnitKind; 6] = [
        UnitKind::City,
        UnitKind::Port,
        UnitKind::Factory,
        UnitKind::DefensePost,
        UnitKind::MissileSilo,
        UnitKind::SamLauncher,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            UnitKind::City => "city",
            UnitKind::Port => "port",
            UnitKind::Factory => "factory",
            UnitKind::DefensePost => "defense_post",
            UnitKind::MissileSilo => "missile_silo",
            UnitKind::SamLauncher => "sam_launcher",
            UnitKind::Warship => "warship",
            UnitKind::TransportShip => "transport_ship",
            UnitKind::AtomBomb => "atom_bomb",
            UnitKind::HydrogenBomb => "hydrogen_bomb",
            UnitKind::Mirv => "mirv",
            UnitKind::MirvWarhead => "mirv_warhead",
            UnitKind::SamMissile => "sam_missile",
        }
    }

    pub fn is_structure(self) -> bool {
        Self::STRUCTURES.contains(&self)
    }

    pub fn is_nuke(self) -> bool {
        matches!(
            self,
            UnitKind::AtomBomb | UnitKind::HydrogenBomb | UnitKind::Mirv | UnitKind::MirvWarhead
        )
    }

    /// Structures whose value the economy depends on.
    pub fn is_economic(self) -> bool {
        matches!(self, UnitKind::City | UnitKind::Port | UnitKind::Factory)
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bilateral attitude, ordered from worst to best.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Relation {
    Hostile = 0,
    Distrustful = 1,
    Neutral = 2,
    Friendly = 3,
}

impl Relation {
    pub fn from_score(score: i32) -> Self {
        if score <= -50 {
            Relation::Hostile
        } else if score < 0 {
            Relation::Distrustful
        } else if score < 50 {
            Relation::Neutral
        } else {
            Relation::Friendly
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
    Impossible,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    #[default]
    FreeForAll,
    Team,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Team {
    Numbered(u16),
    /// Non-competing team holding the tribal bots; never declared winner.
    Bot,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PlayerKind {
    Human,
    /// Tribal filler bot.
    Bot,
    /// Scripted nation driven by the nation controller.
    Nation,
}

/// Work item emitted for sibling executions outside the decision core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExecutionRequest {
    Spawn {
        player: PlayerId,
        tile: TileRef,
    },
    Construct {
        player: PlayerId,
        kind: UnitKind,
        tile: TileRef,
    },
    Upgrade {
        player: PlayerId,
        unit: UnitId,
    },
    LaunchNuke {
        player: PlayerId,
        kind: UnitKind,
        target: TileRef,
    },
    LaunchMirv {
        player: PlayerId,
        target: TileRef,
    },
    /// `target == None` expands into unowned land.
    Attack {
        player: PlayerId,
        target: Option<PlayerId>,
        troops: u64,
    },
    TransportShip {
        player: PlayerId,
        target: Option<PlayerId>,
        destination: TileRef,
        troops: u64,
    },
    AllianceRequest {
        from: PlayerId,
        to: PlayerId,
    },
}

impl ExecutionRequest {
    pub fn player(&self) -> PlayerId {
        match self {
            ExecutionRequest::Spawn { player, .. }
            | ExecutionRequest::Construct { player, .. }
            | ExecutionRequest::Upgrade { player, .. }
            | ExecutionRequest::LaunchNuke { player, .. }
            | ExecutionRequest::LaunchMirv { player, .. }
            | ExecutionRequest::Attack { player, .. }
            | ExecutionRequest::TransportShip { player, .. } => *player,
            ExecutionRequest::AllianceRequest { from, .. } => *from,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MessageKind {
    Info,
    Warn,
    SamHit,
    SamMiss,
    PeaceVote,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EmojiTarget {
    Player(PlayerId),
    All,
}

/// User-visible side channel: messages and cosmetic emoji.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum GameSignal {
    Message {
        kind: MessageKind,
        text: String,
        player: Option<PlayerId>,
    },
    Emoji {
        from: PlayerId,
        to: EmojiTarget,
        emoji: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ActionPayload {
    Request(ExecutionRequest),
    Signal(GameSignal),
    Winner(WinnerRecord),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum WinnerRecord {
    Player(PlayerId),
    Team(Team),
}

/// One entry of the per-game action log; the determinism contract is that two
/// runs with identical inputs produce byte-identical encoded logs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionRecord {
    pub tick: u64,
    pub payload: ActionPayload,
}

pub fn encode_action_log(log: &[ActionRecord]) -> bincode::Result<Vec<u8>> {
    bincode::serialize(log)
}

pub fn decode_action_log(data: &[u8]) -> bincode::Result<Vec<ActionRecord>> {
    bincode::deserialize(data)
}

pub fn hash_action_log(log: &[ActionRecord]) -> u64 {
    let encoded = bincode::serialize(log).expect("action log serialization for hashing");
    let mut hasher = RandomState::with_seeds(0, 0, 0, 0).build_hasher();
    hasher.write(&encoded);
    hasher.finish()
}

pub fn encode_action_log_json(log: &[ActionRecord]) -> serde_json::Result<String> {
    serde_json::to_string(log)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relation_thresholds_match_score_bands() {
        assert_eq!(Relation::from_score(-100), Relation::Hostile);
        assert_eq!(Relation::from_score(-50), Relation::Hostile);
        assert_eq!(Relation::from_score(-49), Relation::Distrustful);
        assert_eq!(Relation::from_score(0), Relation::Neutral);
        assert_eq!(Relation::from_score(50), Relation::Friendly);
        assert!(Relation::Hostile < Relation::Neutral);
    }

    #[test]
    fn action_log_hash_depends_on_order() {
        let a = ActionRecord {
            tick: 3,
            payload: ActionPayload::Request(ExecutionRequest::Attack {
                player: PlayerId(1),
                target: None,
                troops: 500,
            }),
        };
        let b = ActionRecord {
            tick: 4,
            payload: ActionPayload::Winner(WinnerRecord::Player(PlayerId(1))),
        };
        let forward = vec![a.clone(), b.clone()];
        let reversed = vec![b, a];
        assert_eq!(hash_action_log(&forward), hash_action_log(&forward.clone()));
        assert_ne!(hash_action_log(&forward), hash_action_log(&reversed));

        let bytes = encode_action_log(&forward).expect("encode");
        assert_eq!(decode_action_log(&bytes).expect("decode"), forward);
    }
}
