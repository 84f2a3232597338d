/// Largest valid world dimension (world units). Keeps grid allocation bounded.
pub const MAX_WORLD_SIZE: f64 = 8192.0;

/// Hard ceiling on live agents regardless of configuration.
pub const MAX_TOTAL_AGENTS: usize = 10_000;

/// Number of vision rays fanned across the agent's field of view.
pub const NUM_RAYS: usize = 7;

/// Field of view covered by the ray fan, centred on the heading.
pub const FIELD_OF_VIEW: f64 = std::f64::consts::PI;

/// Perception vector length: three object types per ray plus six state scalars.
pub const FEATURE_COUNT: usize = NUM_RAYS * 3 + 6;

/// Field values below this snap to zero after decay.
pub const FIELD_EPSILON: f32 = 1e-4;

/// Gradient attenuation applied to cells behind the agent.
pub const BACKWARD_TRAIL_ATTENUATION: f32 = 0.3;

/// Multiplier mixing the tick index into derived RNG seeds.
/// Chosen so streams for consecutive ticks have minimal overlap.
pub const RNG_DERIVATION_PRIME: u64 = 7919;

/// Upper bound on push-out passes when obstacles overlap.
pub const MAX_PUSH_OUT_PASSES: usize = 4;

/// Step distance below which a tick counts as stuck for fitness purposes.
pub const STUCK_STEP_DISTANCE: f64 = 0.5;

/// Ceiling on the colony's food store.
pub const MAX_FOOD_STORED: u32 = 10_000;

/// Food sources keep this distance from the world edge.
pub const FOOD_EDGE_MARGIN: f64 = 50.0;

/// Placement attempts per food source before giving up on constraints.
pub const FOOD_PLACEMENT_ATTEMPTS: usize = 64;

/// Scales a heuristic agent's pheromone sensitivity into its trail-follow gain.
pub const SENSITIVITY_GAIN: f64 = 2.5;

/// Deposit strength used by network-driven agents, which carry no trait for it.
pub const NETWORK_DEPOSIT_STRENGTH: f32 = 1.0;

/// Radius added to the agent radius when rays test other agents.
pub const AGENT_RAY_PADDING: f64 = 2.0;

/// Largest learning history a colony may keep.
pub const MAX_HISTORY_CAPACITY: usize = 100_000;
