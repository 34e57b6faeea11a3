//! # Workflow Primitives
//!
//! Hardcoded constants for the gate workflow.
//!
//! These are compiled into the binary and are immutable at runtime.
//! Configurable values (gates, thresholds, committee) live in the catalog
//! and the committee registry instead.

use crate::Weight;

/// Voting weight applied to voters absent from the committee registry.
///
/// Unregistered voters are tolerated rather than rejected; their votes
/// count with this weight.
pub const DEFAULT_VOTING_WEIGHT: Weight = Weight::ONE;

/// Default weight for a committee chair whose weight is not configured.
pub const CHAIR_VOTING_WEIGHT: Weight = Weight::from_milli(1500);

/// Default weight for a committee vice-chair whose weight is not configured.
pub const VICE_CHAIR_VOTING_WEIGHT: Weight = Weight::from_milli(1250);

/// Name recorded as the actor when the workflow acts on its own behalf.
pub const SYSTEM_ACTOR: &str = "system";

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for deal ids, member ids, gate names and actors.
pub const MAX_ID_LENGTH: usize = 128;

/// Maximum length for a single artifact name.
pub const MAX_ARTIFACT_NAME_LENGTH: usize = 256;

/// Maximum number of artifacts asserted in one advance.
pub const MAX_ASSERTED_ARTIFACTS: usize = 256;

/// Maximum length for a free-text comment (16 KB).
pub const MAX_COMMENT_LENGTH: usize = 16 * 1024;
