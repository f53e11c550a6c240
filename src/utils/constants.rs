//! Well-known path constants for agent-card discovery and the default RPC route.

/// Current A2A well-known agent-card path.
pub const AGENT_CARD_WELL_KNOWN_PATH: &str = "/.well-known/agent-card.json";

/// Path this crate's router actually serves the agent card at.
pub const PREV_AGENT_CARD_WELL_KNOWN_PATH: &str = "/.well-known/agent.json";

/// Path for the authenticated extended agent card, when an implementation offers one.
pub const EXTENDED_AGENT_CARD_PATH: &str = "/agent/authenticatedExtendedCard";

/// Default JSON-RPC endpoint path relative to an agent's base URL.
pub const DEFAULT_RPC_URL: &str = "/";
