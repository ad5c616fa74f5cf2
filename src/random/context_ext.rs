use std::any::TypeId;
use std::cell::RefMut;

use log::trace;
use rand::{Rng, SeedableRng};

use crate::context::Context;
use crate::hashing::hash_str;
use crate::random::{RngHolder, RngId, RngPlugin};

/// Gets a mutable reference to the random number generator associated with the given
/// [`RngId`]. If the Rng has not been used before, one will be created from the base seed
/// set with `init_random`.
fn get_rng<R: RngId>(context: &Context) -> RefMut<R::RngType> {
    let data_container = context
        .try_get_data(RngPlugin)
        .filter(|data| data.base_seed.is_some())
        .expect("You must initialize the random number generator with a base seed");
    let base_seed = data_container.base_seed.unwrap_or_default();

    let rng_holders = data_container
        .rng_holders
        .try_borrow_mut()
        .expect("random stream is already borrowed");
    RefMut::map(rng_holders, |holders| {
        holders
            .entry(TypeId::of::<R>())
            .or_insert_with(|| {
                trace!("creating rng {} (base seed {base_seed})", R::get_name());
                let seed_offset = hash_str(R::get_name());
                RngHolder {
                    rng: Box::new(R::RngType::seed_from_u64(
                        base_seed.wrapping_add(seed_offset),
                    )),
                }
            })
            .rng
            .downcast_mut::<R::RngType>()
            .expect("rng holder has the wrong type")
    })
}

// This is a trait extension on Context for
// random number generation functionality.
pub trait ContextRandomExt {
    /// Sets the base seed and drops every stream created so far, so that the
    /// next draw from each stream starts from the beginning of its sequence.
    fn init_random(&mut self, base_seed: u64);

    /// Applies `sampler` to the stream associated with `R`.
    ///
    /// # Panics
    ///
    /// Panics if `init_random` was not called, or if called re-entrantly from
    /// inside another `sampler`.
    fn sample<R: RngId, T>(&self, rng_id: R, sampler: impl FnOnce(&mut R::RngType) -> T) -> T;

    /// Returns `true` with probability `p`.
    fn sample_bool<R: RngId>(&self, rng_id: R, p: f64) -> bool
    where
        R::RngType: Rng;
}

impl ContextRandomExt for Context {
    fn init_random(&mut self, base_seed: u64) {
        trace!("initializing random module");
        let data_container = self.get_data_mut(RngPlugin);
        data_container.base_seed = Some(base_seed);
        data_container.rng_holders.get_mut().clear();
    }

    fn sample<R: RngId, T>(&self, _rng_id: R, sampler: impl FnOnce(&mut R::RngType) -> T) -> T {
        let mut rng = get_rng::<R>(self);
        sampler(&mut rng)
    }

    fn sample_bool<R: RngId>(&self, rng_id: R, p: f64) -> bool
    where
        R::RngType: Rng,
    {
        self.sample(rng_id, |rng| rng.random_bool(p))
    }
}
