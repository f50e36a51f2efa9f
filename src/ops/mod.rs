//! Clients for the external capabilities the editor depends on: caption
//! generation/translation, AI image editing, the wallet signer, and the
//! gallery backend.  All of them are blocking HTTP clients intended to run on
//! worker threads; results come back to the UI over a channel.

pub mod caption;
pub mod edit;
pub mod gallery;
pub mod wallet;
