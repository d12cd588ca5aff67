//! NaN-bit-pattern-preserving wrappers around `f32`/`f64`.
//!
//! Plain Rust float arithmetic is free to pick any NaN payload when an operation produces NaN,
//! but Wasm requires deterministic canonical-NaN propagation (Executor, "Arithmetic"). We store
//! floats as their raw bits and only go through `f32`/`f64` methods for the handful of operations
//! where Rust's `std` behavior already matches the spec (`floor`, `ceil`, `trunc`, `sqrt`, ...),
//! keeping sign/abs/neg as direct bit manipulation so they never touch NaN payload bits at all.

use core::cmp::{Ordering, PartialEq, PartialOrd};
use core::ops::{Add, Div, Mul, Neg, Rem, Sub};

macro_rules! impl_binop {
    ($for:ident, $is:ident, $op:ident, $func_name:ident) => {
        impl<T: Into<$for>> $op<T> for $for {
            type Output = Self;

            fn $func_name(self, other: T) -> Self {
                $for($op::$func_name(self.to_float(), other.into().to_float()).to_bits())
            }
        }
    };
}

macro_rules! float {
    ($for:ident, $rep:ident, $is:ident, $sign_bit:expr) => {
        #[derive(Copy, Clone)]
        pub struct $for($rep);

        impl_binop!($for, $is, Add, add);
        impl_binop!($for, $is, Sub, sub);
        impl_binop!($for, $is, Mul, mul);
        impl_binop!($for, $is, Div, div);
        impl_binop!($for, $is, Rem, rem);

        impl $for {
            pub fn from_bits(bits: $rep) -> Self {
                $for(bits)
            }

            pub fn to_bits(self) -> $rep {
                self.0
            }

            pub fn from_float(fl: $is) -> Self {
                fl.into()
            }

            pub fn to_float(self) -> $is {
                self.into()
            }

            pub fn is_nan(self) -> bool {
                self.to_float().is_nan()
            }

            pub fn abs(self) -> Self {
                $for(self.0 & !$sign_bit)
            }

            pub fn copysign(self, sign_of: Self) -> Self {
                $for((self.0 & !$sign_bit) | (sign_of.0 & $sign_bit))
            }

            pub fn floor(self) -> Self {
                Self::from(self.to_float().floor())
            }

            pub fn ceil(self) -> Self {
                Self::from(self.to_float().ceil())
            }

            pub fn trunc(self) -> Self {
                Self::from(self.to_float().trunc())
            }

            pub fn sqrt(self) -> Self {
                Self::from(self.to_float().sqrt())
            }

            /// Wasm's `nearest`: round half-to-even, unlike `std`'s round-half-away-from-zero.
            pub fn nearest(self) -> Self {
                let f = self.to_float();
                if f.is_nan() || f.is_infinite() {
                    return self;
                }
                let floor = f.floor();
                let diff = f - floor;
                let rounded = if diff < 0.5 {
                    floor
                } else if diff > 0.5 {
                    floor + 1.0
                } else if (floor as i64) % 2 == 0 {
                    floor
                } else {
                    floor + 1.0
                };
                Self::from(rounded)
            }

            pub fn min(self, other: Self) -> Self {
                let (a, b) = (self.to_float(), other.to_float());
                if a.is_nan() || b.is_nan() {
                    return Self::from($is::NAN);
                }
                Self::from(a.min(b))
            }

            pub fn max(self, other: Self) -> Self {
                let (a, b) = (self.to_float(), other.to_float());
                if a.is_nan() || b.is_nan() {
                    return Self::from($is::NAN);
                }
                Self::from(a.max(b))
            }
        }

        impl From<$is> for $for {
            fn from(other: $is) -> $for {
                $for(other.to_bits())
            }
        }

        impl From<$for> for $is {
            fn from(other: $for) -> $is {
                <$is>::from_bits(other.0)
            }
        }

        impl Neg for $for {
            type Output = Self;

            fn neg(self) -> Self {
                $for(self.0 ^ $sign_bit)
            }
        }

        #[allow(clippy::cmp_owned)]
        impl<T: Into<$for> + Copy> PartialEq<T> for $for {
            fn eq(&self, other: &T) -> bool {
                $is::from(*self) == $is::from((*other).into())
            }
        }

        impl<T: Into<$for> + Copy> PartialOrd<T> for $for {
            fn partial_cmp(&self, other: &T) -> Option<Ordering> {
                $is::from(*self).partial_cmp(&$is::from((*other).into()))
            }
        }

        impl core::fmt::Debug for $for {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                $is::from(*self).fmt(f)
            }
        }
    };
}

float!(F32, u32, f32, 0x8000_0000u32);
float!(F64, u64, f64, 0x8000_0000_0000_0000u64);

#[cfg(test)]
mod tests {
    use super::{F32, F64};
    use core::ops::Neg;

    #[test]
    fn neg_preserves_nan_payload() {
        assert_eq!(F32::from_bits(0xff80_3210).neg().to_bits(), 0x7f80_3210);
        assert_eq!(
            F64::from_bits(0xff80_3210_0000_0000).neg().to_bits(),
            0x7f80_3210_0000_0000
        );
    }

    #[test]
    fn nearest_rounds_half_to_even() {
        assert_eq!(F32::from_float(2.5).nearest().to_float(), 2.0);
        assert_eq!(F32::from_float(3.5).nearest().to_float(), 4.0);
        assert_eq!(F32::from_float(-2.5).nearest().to_float(), -2.0);
    }

    #[test]
    fn min_max_propagate_nan() {
        assert!(F64::from_float(f64::NAN).min(F64::from_float(1.0)).is_nan());
        assert!(F64::from_float(1.0).max(F64::from_float(f64::NAN)).is_nan());
    }
}
