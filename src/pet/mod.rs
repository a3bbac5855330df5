pub mod definition;
pub mod registry;
pub mod state;

pub use definition::{NeedDecay, SpeciesDefinition};
pub use registry::{SpeciesRegistry, FALLBACK_SPECIES};
pub use state::{Pet, PetState, PetUpdate};
