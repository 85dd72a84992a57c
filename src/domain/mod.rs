// Domain layer: site and binding models, binding collision rules and the
// host capabilities (ports).

pub mod model;
pub mod ports;
pub mod rules;
