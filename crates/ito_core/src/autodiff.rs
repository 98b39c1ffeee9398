use crate::traits::Scalar;
use num_traits::{Float, FromPrimitive, Num, NumCast, One, ToPrimitive, Zero};
use std::cmp::Ordering;
use std::ops::{
    Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Rem, RemAssign, Sub, SubAssign,
};

/// Dual number for forward-mode AD.
/// val: real part
/// eps: infinitesimal part (directional derivative)
///
/// The component type is itself a `Scalar`, so `Dual<Dual<f64>>` carries a
/// second independent infinitesimal and yields mixed second derivatives.
///
/// Comparisons look at the real part only, so branches taken inside a
/// function depend on the point and never on the seeded direction.
#[derive(Debug, Clone, Copy)]
pub struct Dual<T = f64> {
    pub val: T,
    pub eps: T,
}

impl<T: PartialEq> PartialEq for Dual<T> {
    fn eq(&self, other: &Self) -> bool {
        self.val == other.val
    }
}

impl<T: PartialOrd> PartialOrd for Dual<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.val.partial_cmp(&other.val)
    }
}

impl<T: Scalar> Dual<T> {
    pub fn new(val: T, eps: T) -> Self {
        Self { val, eps }
    }

    /// A value with zero derivative.
    pub fn constant(val: T) -> Self {
        Self::new(val, T::zero())
    }

    /// Applies a scalar rule: `value = g(val)`, `eps = g'(val) * eps`.
    fn chain(self, value: T, slope: T) -> Self {
        Self::new(value, slope * self.eps)
    }
}

impl<T: Scalar> Zero for Dual<T> {
    fn zero() -> Self {
        Self::constant(T::zero())
    }
    fn is_zero(&self) -> bool {
        self.val.is_zero() && self.eps.is_zero()
    }
}

impl<T: Scalar> One for Dual<T> {
    fn one() -> Self {
        Self::constant(T::one())
    }
}

impl<T: Scalar> Add for Dual<T> {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.val + rhs.val, self.eps + rhs.eps)
    }
}

impl<T: Scalar> Sub for Dual<T> {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.val - rhs.val, self.eps - rhs.eps)
    }
}

impl<T: Scalar> Mul for Dual<T> {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self::new(self.val * rhs.val, self.val * rhs.eps + self.eps * rhs.val)
    }
}

impl<T: Scalar> Div for Dual<T> {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        let denom = rhs.val * rhs.val;
        Self::new(
            self.val / rhs.val,
            (self.eps * rhs.val - self.val * rhs.eps) / denom,
        )
    }
}

impl<T: Scalar> Neg for Dual<T> {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.val, -self.eps)
    }
}

impl<T: Scalar> Rem for Dual<T> {
    type Output = Self;
    fn rem(self, rhs: Self) -> Self {
        // a % b = a - trunc(a / b) * b, with trunc locally constant.
        let q = (self.val / rhs.val).trunc();
        Self::new(self.val % rhs.val, self.eps - q * rhs.eps)
    }
}

impl<T: Scalar> AddAssign for Dual<T> {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}
impl<T: Scalar> SubAssign for Dual<T> {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}
impl<T: Scalar> MulAssign for Dual<T> {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}
impl<T: Scalar> DivAssign for Dual<T> {
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}
impl<T: Scalar> RemAssign for Dual<T> {
    fn rem_assign(&mut self, rhs: Self) {
        *self = *self % rhs;
    }
}

impl<T: Scalar> Num for Dual<T> {
    type FromStrRadixErr = ();
    fn from_str_radix(str: &str, radix: u32) -> Result<Self, Self::FromStrRadixErr> {
        T::from_str_radix(str, radix)
            .map(Self::constant)
            .map_err(|_| ())
    }
}

impl<T: Scalar> ToPrimitive for Dual<T> {
    fn to_i64(&self) -> Option<i64> {
        self.val.to_i64()
    }
    fn to_u64(&self) -> Option<u64> {
        self.val.to_u64()
    }
    fn to_f64(&self) -> Option<f64> {
        self.val.to_f64()
    }
}

impl<T: Scalar> FromPrimitive for Dual<T> {
    fn from_i64(n: i64) -> Option<Self> {
        T::from_i64(n).map(Self::constant)
    }
    fn from_u64(n: u64) -> Option<Self> {
        T::from_u64(n).map(Self::constant)
    }
    fn from_f64(n: f64) -> Option<Self> {
        T::from_f64(n).map(Self::constant)
    }
}

impl<T: Scalar> NumCast for Dual<T> {
    fn from<N: ToPrimitive>(n: N) -> Option<Self> {
        <T as NumCast>::from(n).map(Self::constant)
    }
}

impl<T: Scalar> Float for Dual<T> {
    fn nan() -> Self {
        Self::constant(T::nan())
    }
    fn infinity() -> Self {
        Self::constant(T::infinity())
    }
    fn neg_infinity() -> Self {
        Self::constant(T::neg_infinity())
    }
    fn neg_zero() -> Self {
        Self::constant(T::neg_zero())
    }
    fn min_value() -> Self {
        Self::constant(T::min_value())
    }
    fn min_positive_value() -> Self {
        Self::constant(T::min_positive_value())
    }
    fn max_value() -> Self {
        Self::constant(T::max_value())
    }
    fn is_nan(self) -> bool {
        self.val.is_nan()
    }
    fn is_infinite(self) -> bool {
        self.val.is_infinite()
    }
    fn is_finite(self) -> bool {
        self.val.is_finite()
    }
    fn is_normal(self) -> bool {
        self.val.is_normal()
    }
    fn classify(self) -> std::num::FpCategory {
        self.val.classify()
    }
    fn floor(self) -> Self {
        Self::constant(self.val.floor())
    }
    fn ceil(self) -> Self {
        Self::constant(self.val.ceil())
    }
    fn round(self) -> Self {
        Self::constant(self.val.round())
    }
    fn trunc(self) -> Self {
        Self::constant(self.val.trunc())
    }
    fn fract(self) -> Self {
        Self::new(self.val.fract(), self.eps)
    }
    fn abs(self) -> Self {
        if self.val >= T::zero() {
            self
        } else {
            -self
        }
    }
    fn signum(self) -> Self {
        Self::constant(self.val.signum())
    }
    fn is_sign_positive(self) -> bool {
        self.val.is_sign_positive()
    }
    fn is_sign_negative(self) -> bool {
        self.val.is_sign_negative()
    }
    fn mul_add(self, a: Self, b: Self) -> Self {
        self * a + b
    }
    fn recip(self) -> Self {
        let r = self.val.recip();
        self.chain(r, -(r * r))
    }

    fn powi(self, n: i32) -> Self {
        if n == 0 {
            return Self::one();
        }
        let slope = T::lift(<f64 as From<i32>>::from(n)) * self.val.powi(n - 1);
        self.chain(self.val.powi(n), slope)
    }

    fn powf(self, n: Self) -> Self {
        let val_pow = self.val.powf(n.val);
        if n.eps.is_zero() {
            let slope = n.val * self.val.powf(n.val - T::one());
            return self.chain(val_pow, slope);
        }
        // x^y = exp(y * ln(x))
        let eps_new = val_pow * (n.eps * self.val.ln() + n.val * self.eps / self.val);
        Self::new(val_pow, eps_new)
    }

    fn sqrt(self) -> Self {
        let s = self.val.sqrt();
        self.chain(s, (s + s).recip())
    }

    fn exp(self) -> Self {
        let e = self.val.exp();
        self.chain(e, e)
    }

    fn exp2(self) -> Self {
        let e = self.val.exp2();
        self.chain(e, e * T::lift(std::f64::consts::LN_2))
    }
    fn ln(self) -> Self {
        self.chain(self.val.ln(), self.val.recip())
    }
    fn log(self, base: Self) -> Self {
        self.ln() / base.ln()
    }
    fn log2(self) -> Self {
        let slope = (self.val * T::lift(std::f64::consts::LN_2)).recip();
        self.chain(self.val.log2(), slope)
    }
    fn log10(self) -> Self {
        let slope = (self.val * T::lift(std::f64::consts::LN_10)).recip();
        self.chain(self.val.log10(), slope)
    }

    fn max(self, other: Self) -> Self {
        if self.val > other.val {
            self
        } else {
            other
        }
    }
    fn min(self, other: Self) -> Self {
        if self.val < other.val {
            self
        } else {
            other
        }
    }

    fn abs_sub(self, other: Self) -> Self {
        if self.val > other.val {
            self - other
        } else {
            Self::zero()
        }
    }

    fn cbrt(self) -> Self {
        let c = self.val.cbrt();
        self.chain(c, (T::lift(3.0) * c * c).recip())
    }
    fn hypot(self, other: Self) -> Self {
        let h = self.val.hypot(other.val);
        if h.is_zero() {
            return Self::constant(h);
        }
        Self::new(h, (self.val * self.eps + other.val * other.eps) / h)
    }

    fn sin(self) -> Self {
        self.chain(self.val.sin(), self.val.cos())
    }
    fn cos(self) -> Self {
        self.chain(self.val.cos(), -self.val.sin())
    }
    fn tan(self) -> Self {
        let t = self.val.tan();
        self.chain(t, T::one() + t * t)
    }
    fn asin(self) -> Self {
        let slope = (T::one() - self.val * self.val).sqrt().recip();
        self.chain(self.val.asin(), slope)
    }
    fn acos(self) -> Self {
        let slope = -(T::one() - self.val * self.val).sqrt().recip();
        self.chain(self.val.acos(), slope)
    }
    fn atan(self) -> Self {
        let slope = (T::one() + self.val * self.val).recip();
        self.chain(self.val.atan(), slope)
    }
    fn atan2(self, other: Self) -> Self {
        // self = y, other = x
        let denom = self.val * self.val + other.val * other.val;
        Self::new(
            self.val.atan2(other.val),
            (other.val * self.eps - self.val * other.eps) / denom,
        )
    }
    fn sin_cos(self) -> (Self, Self) {
        (self.sin(), self.cos())
    }

    fn exp_m1(self) -> Self {
        self.chain(self.val.exp_m1(), self.val.exp())
    }
    fn ln_1p(self) -> Self {
        self.chain(self.val.ln_1p(), (T::one() + self.val).recip())
    }
    fn sinh(self) -> Self {
        self.chain(self.val.sinh(), self.val.cosh())
    }
    fn cosh(self) -> Self {
        self.chain(self.val.cosh(), self.val.sinh())
    }
    fn tanh(self) -> Self {
        let t = self.val.tanh();
        self.chain(t, T::one() - t * t)
    }
    fn asinh(self) -> Self {
        let slope = (self.val * self.val + T::one()).sqrt().recip();
        self.chain(self.val.asinh(), slope)
    }
    fn acosh(self) -> Self {
        let slope = (self.val * self.val - T::one()).sqrt().recip();
        self.chain(self.val.acosh(), slope)
    }
    fn atanh(self) -> Self {
        let slope = (T::one() - self.val * self.val).recip();
        self.chain(self.val.atanh(), slope)
    }

    fn integer_decode(self) -> (u64, i16, i8) {
        self.val.integer_decode()
    }
}

#[cfg(test)]
mod tests {
    use super::Dual;
    use approx::assert_abs_diff_eq;
    use num_traits::Float;

    fn seeded(x: f64) -> Dual {
        Dual::new(x, 1.0)
    }

    #[test]
    fn product_and_quotient_rules() {
        let x = seeded(3.0);
        let y = x * x / (x + Dual::constant(1.0));
        // d/dx x^2/(x+1) = (x^2 + 2x)/(x+1)^2
        assert_abs_diff_eq!(y.val, 9.0 / 4.0, epsilon = 1e-14);
        assert_abs_diff_eq!(y.eps, 15.0 / 16.0, epsilon = 1e-14);
    }

    #[test]
    fn transcendental_derivatives_match_closed_forms() {
        let x = 0.3;
        let cases: Vec<(Dual, f64)> = vec![
            (seeded(x).tanh(), 1.0 - x.tanh().powi(2)),
            (seeded(x).exp(), x.exp()),
            (seeded(x).ln(), 1.0 / x),
            (seeded(x).sqrt(), 0.5 / x.sqrt()),
            (seeded(x).sin(), x.cos()),
            (seeded(x).atan(), 1.0 / (1.0 + x * x)),
            (seeded(x).asin(), 1.0 / (1.0 - x * x).sqrt()),
            (seeded(x).powi(3), 3.0 * x * x),
            (seeded(x).powf(Dual::constant(2.5)), 2.5 * x.powf(1.5)),
            (seeded(x).log2(), 1.0 / (x * std::f64::consts::LN_2)),
            (seeded(x).cbrt(), 1.0 / (3.0 * x.cbrt().powi(2))),
            (seeded(x).ln_1p(), 1.0 / (1.0 + x)),
        ];
        for (dual, expected) in cases {
            assert_abs_diff_eq!(dual.eps, expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn powf_with_constant_exponent_handles_negative_base() {
        let y = Dual::new(-2.0, 1.0).powf(Dual::constant(2.0));
        assert_abs_diff_eq!(y.val, 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(y.eps, -4.0, epsilon = 1e-12);
    }

    #[test]
    fn powi_zero_is_constant_one() {
        let y = Dual::new(0.0, 1.0).powi(0);
        assert_eq!(y.val, 1.0);
        assert_eq!(y.eps, 0.0);
    }

    #[test]
    fn powi_matches_power_rule() {
        let cube = Dual::new(2.0, 1.0).powi(3);
        assert_abs_diff_eq!(cube.val, 8.0, epsilon = 1e-15);
        assert_abs_diff_eq!(cube.eps, 12.0, epsilon = 1e-15);

        let inverse_square = Dual::new(2.0, 1.0).powi(-2);
        assert_abs_diff_eq!(inverse_square.eps, -0.25, epsilon = 1e-15);
    }

    #[test]
    fn comparisons_ignore_the_tangent() {
        let zero = Dual::constant(0.0);
        assert!(Dual::new(0.0, 1.0) <= zero);
        assert!(Dual::new(0.0, -1.0) <= zero);
        assert_eq!(Dual::new(2.0, 5.0), Dual::new(2.0, -3.0));
        assert!(Dual::new(1.0, 100.0) < Dual::new(2.0, -100.0));
    }

    #[test]
    fn hypot_at_origin_has_zero_derivative() {
        let h = Dual::new(0.0, 1.0).hypot(Dual::new(0.0, 2.0));
        assert_eq!(h.val, 0.0);
        assert_eq!(h.eps, 0.0);

        let h = Dual::new(3.0, 1.0).hypot(Dual::constant(4.0));
        assert_abs_diff_eq!(h.eps, 0.6, epsilon = 1e-15);
    }

    #[test]
    fn nested_duals_yield_second_derivative() {
        // f(x) = x^3 at x = 2 along direction 1: f'' = 6x = 12
        let x: Dual<Dual> = Dual::new(Dual::new(2.0, 1.0), Dual::new(1.0, 0.0));
        let y = x * x * x;
        assert_abs_diff_eq!(y.val.val, 8.0, epsilon = 1e-14);
        assert_abs_diff_eq!(y.val.eps, 12.0, epsilon = 1e-14);
        assert_abs_diff_eq!(y.eps.val, 12.0, epsilon = 1e-14);
        assert_abs_diff_eq!(y.eps.eps, 12.0, epsilon = 1e-14);
    }
}
