//! Core library for `Stowage`.
//!
//! Contains the injection template engine used to turn compose templates into
//! deployable documents: the placeholder model and parser, the secure token
//! generator, the internal configuration document, and the injector that
//! extracts, resolves, and validates `{{…}}` placeholders. This crate knows
//! nothing about HTTP, persistence, or docker-compose itself.

pub mod error;
pub mod generator;
pub mod injector;
pub mod internal;
pub mod point;

pub use error::{GeneratorError, InjectError, InjectionPointError, ResolveError};
pub use injector::{Injector, Preparation, Scan, Validation};
pub use internal::{Host, Internal, Subkey};
pub use point::{GenerateCategory, InjectionPoint, InternalTransform};
