//! Global string interner.
//!
//! Converts hot strings (scheme names, canonical shader parameter names) into
//! integer [`Symbol`]s so that comparison and hashing reduce to integer ops.
//! Fingerprints and the program cache lean on this.

use lasso::{Spur, ThreadedRodeo};
use std::sync::OnceLock;

static INTERNER: OnceLock<ThreadedRodeo> = OnceLock::new();

/// Compact integer identifier for an interned string.
pub type Symbol = Spur;

fn rodeo() -> &'static ThreadedRodeo {
    INTERNER.get_or_init(ThreadedRodeo::new)
}

/// Intern a string, returning its [`Symbol`].
///
/// Repeated calls with the same string return the same symbol.
#[inline]
pub fn intern(s: &str) -> Symbol {
    rodeo().get_or_intern(s)
}

/// Look up the [`Symbol`] of an already-interned string without allocating.
#[inline]
#[must_use]
pub fn get(s: &str) -> Option<Symbol> {
    rodeo().get(s)
}

/// Resolve a [`Symbol`] back to its string.
///
/// # Panics
/// Panics if the symbol did not come from this interner.
#[inline]
#[must_use]
pub fn resolve(sym: Symbol) -> &'static str {
    rodeo().resolve(&sym)
}

/// Pre-intern names that show up on every generation.
///
/// Called once by the shader generator so the hot path never takes the
/// interner's write lock for well-known names.
pub fn preload_common_names() {
    let common = [
        // Schemes
        "default",
        "shadow-caster",
        // Vertex inputs
        "a_position",
        "a_normal",
        "a_tangent",
        "a_color",
        "a_blend_weights",
        "a_blend_indices",
        // Frequently resolved uniforms
        "u_world_matrix",
        "u_world_view_proj_matrix",
        "u_view_proj_matrix",
        "u_inv_trans_world_matrix",
        "u_camera_position",
        "u_ambient_light_colour",
        "u_surface_ambient",
        "u_surface_diffuse",
        "u_surface_specular",
        "u_surface_emissive",
        "u_surface_shininess",
    ];

    let interner = rodeo();
    for name in common {
        interner.get_or_intern_static(name);
    }
}
