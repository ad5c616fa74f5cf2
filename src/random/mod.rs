mod context_ext;
mod macros;

use std::any::{Any, TypeId};
use std::cell::RefCell;

pub use context_ext::ContextRandomExt;
pub use macros::define_rng;

use crate::define_data_plugin;
use crate::hashing::HashMap;
use rand::SeedableRng;

pub trait RngId: Copy + Clone + Any {
    type RngType: SeedableRng;
    fn get_name() -> &'static str;
}

// Type-erased so that any `SeedableRng` can back a stream.
struct RngHolder {
    rng: Box<dyn Any>,
}

struct RngData {
    base_seed: Option<u64>,
    rng_holders: RefCell<HashMap<TypeId, RngHolder>>,
}

// Registers a data container which stores:
// * base_seed: the seed every stream is derived from; `None` until `init_random`
// * rng_holders: the streams created so far, keyed by their RngId. Held in a
//   RefCell so sampling needs only a shared borrow of the Context.
define_data_plugin!(
    RngPlugin,
    RngData,
    RngData {
        base_seed: None,
        rng_holders: RefCell::new(HashMap::default()),
    }
);
