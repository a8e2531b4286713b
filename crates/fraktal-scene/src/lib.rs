//! Scene-description directives for fraktal model files.
//!
//! A model file is kernel source that may also carry scene directives:
//!
//! ```text
//! #resolution(400, 300)
//! #view(dir=(30deg, -10deg), pos=(0, 0.5, 5))
//! #camera(yfov=40deg, center=(200, 150))
//! #sun(size=0.5deg, dir=(45deg, 60deg), color=(1, 0.9, 0.8), intensity=4)
//! #widget(Sun, dir=(45deg, 60deg))
//! ```
//!
//! [`preprocess`] reads these into a [`SceneParams`] and blanks them out, so
//! the remaining text can go straight to the kernel linker.
//!
//! # Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`error`] | `SceneError` |
//! | [`params`] | `SceneParams` and the per-directive value types |
//! | [`preprocess`](mod@preprocess) | the `preprocess` entry point |
//!
//! # Quick start
//!
//! ```rust
//! use fraktal_scene::{SceneParams, preprocess};
//!
//! let mut text = String::from("#resolution(320,240)\nfn main() {}\n");
//! let mut params = SceneParams::default();
//! preprocess(&mut text, &mut params).unwrap();
//! assert_eq!((params.resolution.x, params.resolution.y), (320, 240));
//! assert!(text.trim_start().starts_with("fn main"));
//! ```

mod cursor;
pub mod error;
pub mod params;
pub mod preprocess;

pub use error::SceneError;
pub use params::{Angle2, Camera, Float2, Float3, Int2, SceneParams, Sun, View, Widget, yfov_to_focal};
pub use preprocess::preprocess;
