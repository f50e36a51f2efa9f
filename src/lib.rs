//! MemeFE — an interactive meme-caption editor.
//!
//! The core is the compositing canvas: a layer model of movable, resizable
//! text captions over a pannable/zoomable background image, rendered through
//! a deterministic CPU pipeline and flattened to JPEG for export.  Caption
//! generation, translation, AI image editing, wallet signing, and the gallery
//! backend are external capabilities reached over HTTP from worker threads.

pub mod app;
pub mod canvas;
pub mod components;
pub mod geometry;
pub mod input;
pub mod io;
pub mod layers;
pub mod logger;
pub mod ops;
pub mod render;
pub mod settings;
