// Enable pedantic lints globally, then allow the noisy ones we're not fixing.
#![warn(clippy::pedantic, clippy::nursery)]
// --- Intentionally allowed ---
#![allow(clippy::must_use_candidate, clippy::return_self_not_must_use)]
// DSP variable names (x1 vs y1, b1 vs a1, etc.) are intentionally similar
#![allow(clippy::similar_names, clippy::many_single_char_names)]
// Audio code performs intentional casts
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_lossless,
    clippy::cast_possible_wrap
)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]
// Style/pedantic lints that add noise without value here
#![allow(
    clippy::module_name_repetitions,
    clippy::doc_markdown,
    clippy::float_cmp,
    clippy::suboptimal_flops,
    clippy::match_same_arms
)]

pub mod amp;
pub mod io;
pub mod settings;
