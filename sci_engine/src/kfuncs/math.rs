use std::f64::consts::PI;

use crate::kernel::KernelReturn;
use crate::reg::Reg;
use crate::state::EngineState;

fn value(reg: i32) -> KernelReturn {
    KernelReturn::Value(Reg::signed(reg as i16))
}

fn arg(args: &[Reg], index: usize) -> i32 {
    args.get(index).map_or(0, |reg| reg.to_i16() as i32)
}

pub fn k_abs(_: &mut EngineState, args: &[Reg]) -> KernelReturn {
    value(arg(args, 0).abs())
}

pub fn k_sqrt(_: &mut EngineState, args: &[Reg]) -> KernelReturn {
    value((arg(args, 0).abs() as f64).sqrt() as i32)
}

/// Angle in degrees from (x1, y1) to (x2, y2), 0 pointing up.
pub fn k_get_angle(_: &mut EngineState, args: &[Reg]) -> KernelReturn {
    value(get_angle(arg(args, 0), arg(args, 1), arg(args, 2), arg(args, 3)))
}

/// The interpreter works in grads and folds them into "degrees" of one or
/// two grads each. Scripts compare against these exact values.
pub fn get_angle(x1: i32, y1: i32, x2: i32, y2: i32) -> i32 {
    let x_rel = (x2 - x1).abs();
    let y_rel = (y1 - y2).abs();
    if x_rel == 0 && y_rel == 0 {
        return 0;
    }

    let mut angle = 100 * x_rel / (x_rel + y_rel);
    if y1 < y2 {
        angle = 200 - angle;
    }
    if x2 < x1 {
        angle = 400 - angle;
    }
    angle - (angle + 9) / 10
}

/// Distance from (x, y) to an optional origin, with an optional
/// perspective angle that stretches the x axis.
pub fn k_get_distance(_: &mut EngineState, args: &[Reg]) -> KernelReturn {
    let x_origin = arg(args, 3) as f64;
    let y_origin = arg(args, 2) as f64;
    let perspective = arg(args, 5) as f64;

    let x_rel = ((arg(args, 1) as f64 - x_origin) / (perspective * PI / 180.0).cos()).trunc();
    let y_rel = arg(args, 0) as f64 - y_origin;
    value((x_rel * x_rel + y_rel * y_rel).sqrt() as i32)
}

pub fn k_sin_mult(_: &mut EngineState, args: &[Reg]) -> KernelReturn {
    let angle = arg(args, 0) as f64 * PI / 180.0;
    value((arg(args, 1) as f64 * angle.sin()) as i32)
}

pub fn k_cos_mult(_: &mut EngineState, args: &[Reg]) -> KernelReturn {
    let angle = arg(args, 0) as f64 * PI / 180.0;
    value((arg(args, 1) as f64 * angle.cos()) as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::SciVersion;

    fn call(native: fn(&mut EngineState, &[Reg]) -> KernelReturn, args: &[i16]) -> i16 {
        let mut state = EngineState::with_system_platform(SciVersion::Sci1Late);
        let args: Vec<Reg> = args.iter().map(|value| Reg::signed(*value)).collect();
        match native(&mut state, &args) {
            KernelReturn::Value(reg) => reg.to_i16(),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn abs_and_sqrt_work_on_signed_values() {
        assert_eq!(call(k_abs, &[-5]), 5);
        assert_eq!(call(k_abs, &[7]), 7);
        assert_eq!(call(k_sqrt, &[-16]), 4);
        assert_eq!(call(k_sqrt, &[10]), 3);
    }

    #[test]
    fn angles_use_grad_folding() {
        assert_eq!(get_angle(0, 0, 0, 0), 0);
        // straight up, right, down, left
        assert_eq!(get_angle(10, 10, 10, 0), 0);
        assert_eq!(get_angle(10, 10, 20, 10), 90);
        assert_eq!(get_angle(10, 10, 10, 20), 180);
        assert_eq!(get_angle(10, 10, 0, 10), 270);
        // diagonal up-right is 50 grads
        assert_eq!(get_angle(0, 10, 10, 0), 45);
    }

    #[test]
    fn distance_defaults_to_origin() {
        assert_eq!(call(k_get_distance, &[3, 4]), 5);
        assert_eq!(call(k_get_distance, &[13, 14, 10, 10]), 5);
    }

    #[test]
    fn sin_and_cos_scale_value() {
        assert_eq!(call(k_sin_mult, &[90, 100]), 100);
        assert_eq!(call(k_cos_mult, &[0, 100]), 100);
        assert_eq!(call(k_sin_mult, &[0, 100]), 0);
    }
}
