pub mod intersection;
pub mod transform;
pub mod vector;

pub use intersection::{cc_int, cl_int, cr_int, ll_int, on_circle, rr_int};
pub use transform::{cs_transform, make_hcs, make_hcs_scaled, transform_point, translation};
pub use vector::{
    Vec2, angle_3p, cross, distance, is_acute, is_clockwise, is_colinear, is_counterclockwise,
    is_obtuse, perp, rotate,
};
