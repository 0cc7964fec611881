//! # isoscope Core Library
//!
//! Streaming inspection and extraction of ISO-9660 images.
//!
//! The crate exposes a small surface: open an image and query it
//! ([`iso::IsoReader`]), or extract it wholesale with progress reporting and
//! cooperative cancellation ([`task::ExtractionTask`] driving
//! [`extract::ExtractionEngine`]).
//!
//! ## Key Modules
//!
//! - [`iso`]: the ISO-9660 decode layer — volume descriptors, directory
//!   records, Rock Ridge attributes, and the forward-only entry stream.
//! - [`extract`]: the two-pass extraction engine with deferred hard links.
//! - [`task`]: background execution, stop flag, and progress relay.
//! - [`detect`]: distribution identification by probing well-known files.
//!
//! ## Examples
//!
//! ```no_run
//! use isoscope::iso::IsoReader;
//!
//! let mut reader = IsoReader::open_image("distro.iso")?;
//! let release = reader.read_file("etc/os-release")?;
//! println!("{}", String::from_utf8_lossy(&release));
//! # Ok::<(), isoscope::ArchiveError>(())
//! ```

pub mod cli;
pub mod detect;
pub mod error;
pub mod extract;
pub mod iso;
pub mod progress;
pub mod task;

pub use error::{ArchiveError, Result};

// Cross-platform filesystem wrapper
pub mod fsx;
