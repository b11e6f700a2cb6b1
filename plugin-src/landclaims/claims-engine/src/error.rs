//! Domain errors. The `Display` text is what players see in chat.

use claims_types::{ChunkPos, RelationKind, WarState};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClaimError {
    #[error("Claim names must be 1-{0} characters: letters, digits, '-' or '_'")]
    InvalidName(usize),

    #[error("You already have a claim named '{0}'")]
    DuplicateName(String),

    #[error("You cannot own more than {0} claims")]
    TooManyClaims(u32),

    #[error("Chunk {chunk} is already claimed by '{claim}'")]
    ChunkTaken { chunk: ChunkPos, claim: String },

    #[error("Claim '{0}' not found")]
    NotFound(String),

    #[error("Chunk {0} is not claimed")]
    NotClaimed(ChunkPos),

    #[error("Claim '{0}' is in another world")]
    WrongWorld(String),

    #[error("Chunk {0} does not touch the claim")]
    NotAdjacent(ChunkPos),

    #[error("Claim '{0}' is full and you have no unallocated chunks left")]
    NoChunksLeft(String),

    #[error("Cannot remove the last chunk of a claim; delete the claim instead")]
    LastChunk,

    #[error("Amount must be at least 1")]
    InvalidAmount,

    #[error("Not enough unallocated chunks: requested {requested}, available {available}")]
    NotEnoughCredits { requested: u32, available: i64 },

    #[error("Only {free} unused purchased chunks can be removed from this claim")]
    CapacityInUse { free: u32 },

    #[error("You do not have permission to manage this claim")]
    NoPermission,

    #[error("The claim owner cannot be targeted")]
    CannotTargetOwner,

    #[error("Unknown group '{0}'")]
    UnknownGroup(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NationError {
    #[error("Nation names must be 3-{0} characters: letters, digits, '-' or '_'")]
    InvalidName(usize),

    #[error("A nation named '{0}' already exists")]
    NameTaken(String),

    #[error("Nation '{0}' not found")]
    NotFound(String),

    #[error("You are already in a nation")]
    AlreadyInNation,

    #[error("That player is already in a nation")]
    TargetInNation,

    #[error("You are not in a nation")]
    NotInNation,

    #[error("That player is not in your nation")]
    TargetNotMember,

    #[error("Only a nation {0} can do that")]
    NoPermission(&'static str),

    #[error("You have not been invited to '{0}'")]
    NotInvited(String),

    #[error("That player has already been invited")]
    AlreadyInvited,

    #[error("The nation is full ({0} members)")]
    Full(usize),

    #[error("The leader cannot leave while other members remain; disband the nation instead")]
    LeaderCannotLeave,

    #[error("You cannot target yourself")]
    CannotTargetSelf,

    #[error("You cannot act on a member of equal or higher rank")]
    Outranked,

    #[error("{0} cannot be promoted further")]
    CannotPromote(String),

    #[error("{0} cannot be demoted further")]
    CannotDemote(String),

    #[error("That claim is not owned by a member of your nation")]
    ClaimNotOwnedByMember,

    #[error("That claim already belongs to a nation")]
    ClaimAlreadyInNation,

    #[error("That claim is not part of your nation")]
    ClaimNotInNation,

    #[error("A nation cannot have relations with itself")]
    SameNation,

    #[error("Relations cannot be changed during a war")]
    AtWar,

    #[error("You are already {0} with that nation")]
    AlreadyRelated(RelationKind),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WarError {
    #[error("A nation cannot declare war on itself")]
    SameNation,

    #[error("You cannot declare war on an ally; break the alliance first")]
    Allied,

    #[error("There is already an open war between these nations")]
    AlreadyAtWar,

    #[error("That nation is protected by a war shield for another {0} minutes")]
    Shielded(u64),

    #[error("There is no open war between these nations")]
    NotFound,

    #[error("Your nation is not part of that war")]
    NotParticipant,

    #[error("Cannot {action} a war that is {from}")]
    InvalidTransition { from: WarState, action: &'static str },

    #[error("Your nation already has a pending tribute in this war")]
    TributePending,

    #[error("There is no pending tribute for your nation")]
    NoPendingTribute,

    #[error("Tribute must be at least 1 chunk")]
    InvalidAmount,
}
