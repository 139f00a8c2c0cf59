//! # External collaborators used by service installs.
//!
//! Each concern sits behind a small trait so installs can be exercised without
//! network access or system tools:
//!
//! - [`Fetch`] downloads release artifacts and config templates ([`HttpFetcher`]);
//! - [`Extract`] pulls one entry out of a zip archive ([`UnzipExtractor`]);
//! - [`CertGenerator`] produces a self-signed key/cert pair ([`SelfSignedCertGenerator`]).
//!
//! [`UnzipExtractor`] shells out through a [`Launcher`](crate::process::Launcher),
//! the same one the supervisors use.

mod archive;
mod cert;
mod fetch;

pub use archive::{Extract, UnzipExtractor};
pub use cert::{CertFiles, CertGenerator, SelfSignedCertGenerator};
pub use fetch::{Fetch, HttpFetcher};
