//! Fixed-step rigid body simulation.
//!
//! `PhysicsStepper` drives a `PhysicsBackend` over every entity carrying both a
//! `Transform` and a `RigidBody`, keeping the last two step snapshots around so
//! rendering can interpolate between them. `RapierBackend` is the default
//! backend; `BuiltinIntegrator` has no contacts and serves as a test stand-in.

mod backend;
mod builtin;
mod components;
mod config;
mod rapier;
mod snapshot;
mod stepper;

pub use backend::{BodyState, ColliderBounds, PhysicsBackend, RayHit};
pub use builtin::BuiltinIntegrator;
pub use config::PhysicsConfig;
pub use rapier::RapierBackend;
pub use components::{BodyKind, RigidBody, Shape, Transform};
pub use snapshot::Snapshot;
pub use stepper::{PhysicsStepper, StepError, StepReport};
