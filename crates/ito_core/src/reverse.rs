//! Reverse-mode automatic differentiation.
//!
//! A [`Tape`] records every operation applied to its variables; a single
//! backward sweep then yields the gradient of one output with respect to all
//! inputs. Tape values are generic over [`Scalar`], so recording over
//! [`Dual`](crate::autodiff::Dual) numbers gives forward-over-reverse
//! differentiation: the dual parts of the adjoints are Hessian-vector
//! products.
//!
//! Variables borrow their tape, which keeps them `Copy` (and thus usable as
//! `num_traits::Float`) while making them neither `Send` nor `Sync`.

use crate::traits::Scalar;
use num_traits::{Float, FromPrimitive, Num, NumCast, One, ToPrimitive, Zero};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::ops::{
    Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Rem, RemAssign, Sub, SubAssign,
};

/// One recorded operation: where the adjoint of this node flows, and with
/// which local partial derivative.
#[derive(Debug, Clone, Copy)]
enum Node<T> {
    Leaf,
    Unary {
        arg: usize,
        weight: T,
    },
    Binary {
        lhs: usize,
        lhs_weight: T,
        rhs: usize,
        rhs_weight: T,
    },
}

/// Operation record for reverse-mode AD.
#[derive(Debug)]
pub struct Tape<T> {
    nodes: RefCell<Vec<Node<T>>>,
}

impl<T: Scalar> Default for Tape<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Scalar> Tape<T> {
    pub fn new() -> Self {
        Self {
            nodes: RefCell::new(Vec::new()),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: RefCell::new(Vec::with_capacity(capacity)),
        }
    }

    /// Registers an independent input variable.
    pub fn var(&self, value: T) -> Var<'_, T> {
        Var {
            tape: Some(self),
            index: self.push(Node::Leaf),
            value,
        }
    }

    /// Number of recorded nodes.
    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, node: Node<T>) -> usize {
        let mut nodes = self.nodes.borrow_mut();
        nodes.push(node);
        nodes.len() - 1
    }

    /// Runs one backward sweep from `output` and returns `d output / d input`
    /// for every entry of `inputs`.
    ///
    /// An output that never touched the tape is constant in the inputs and
    /// yields zeros. Inputs must have been created by this tape.
    pub fn gradient(&self, output: Var<'_, T>, inputs: &[Var<'_, T>]) -> Vec<T> {
        let Some(out_tape) = output.tape else {
            return vec![T::zero(); inputs.len()];
        };
        assert!(std::ptr::eq(out_tape, self), "output recorded on another tape");

        let nodes = self.nodes.borrow();
        let mut adjoints = vec![T::zero(); output.index + 1];
        adjoints[output.index] = T::one();

        for i in (0..=output.index).rev() {
            let adjoint = adjoints[i];
            if adjoint.is_zero() {
                continue;
            }
            match nodes[i] {
                Node::Leaf => {}
                Node::Unary { arg, weight } => {
                    adjoints[arg] = adjoints[arg] + weight * adjoint;
                }
                Node::Binary {
                    lhs,
                    lhs_weight,
                    rhs,
                    rhs_weight,
                } => {
                    adjoints[lhs] = adjoints[lhs] + lhs_weight * adjoint;
                    adjoints[rhs] = adjoints[rhs] + rhs_weight * adjoint;
                }
            }
        }

        inputs
            .iter()
            .map(|input| match input.tape {
                Some(_) if input.index < adjoints.len() => adjoints[input.index],
                _ => T::zero(),
            })
            .collect()
    }
}

/// A value tracked by a [`Tape`]. Constants have no tape and are never
/// recorded. Combining variables of two different tapes panics.
#[derive(Clone, Copy)]
pub struct Var<'t, T> {
    tape: Option<&'t Tape<T>>,
    index: usize,
    value: T,
}

impl<'t, T: Scalar> Var<'t, T> {
    pub fn constant(value: T) -> Self {
        Self {
            tape: None,
            index: 0,
            value,
        }
    }

    pub fn value(&self) -> T {
        self.value
    }

    /// Whether this value depends on some tape input.
    pub fn is_tracked(&self) -> bool {
        self.tape.is_some()
    }

    fn unary(self, value: T, weight: T) -> Self {
        match self.tape {
            Some(tape) => Self {
                tape: Some(tape),
                index: tape.push(Node::Unary {
                    arg: self.index,
                    weight,
                }),
                value,
            },
            None => Self::constant(value),
        }
    }

    fn binary(self, other: Self, value: T, lhs_weight: T, rhs_weight: T) -> Self {
        match (self.tape, other.tape) {
            (Some(tape), Some(other_tape)) => {
                assert!(std::ptr::eq(tape, other_tape), "variables on different tapes");
                Self {
                    tape: Some(tape),
                    index: tape.push(Node::Binary {
                        lhs: self.index,
                        lhs_weight,
                        rhs: other.index,
                        rhs_weight,
                    }),
                    value,
                }
            }
            (Some(_), None) => self.unary(value, lhs_weight),
            (None, Some(_)) => other.unary(value, rhs_weight),
            (None, None) => Self::constant(value),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Var<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Var")
            .field("value", &self.value)
            .field("index", &self.tape.map(|_| self.index))
            .finish()
    }
}

impl<T: PartialEq> PartialEq for Var<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: PartialOrd> PartialOrd for Var<'_, T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.value.partial_cmp(&other.value)
    }
}

impl<T: Scalar> Zero for Var<'_, T> {
    fn zero() -> Self {
        Self::constant(T::zero())
    }
    fn is_zero(&self) -> bool {
        self.value.is_zero()
    }
}

impl<T: Scalar> One for Var<'_, T> {
    fn one() -> Self {
        Self::constant(T::one())
    }
}

impl<T: Scalar> Add for Var<'_, T> {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        self.binary(rhs, self.value + rhs.value, T::one(), T::one())
    }
}

impl<T: Scalar> Sub for Var<'_, T> {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        self.binary(rhs, self.value - rhs.value, T::one(), -T::one())
    }
}

impl<T: Scalar> Mul for Var<'_, T> {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        self.binary(rhs, self.value * rhs.value, rhs.value, self.value)
    }
}

impl<T: Scalar> Div for Var<'_, T> {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        let inv = rhs.value.recip();
        let q = self.value * inv;
        self.binary(rhs, q, inv, -(q * inv))
    }
}

impl<T: Scalar> Neg for Var<'_, T> {
    type Output = Self;
    fn neg(self) -> Self {
        self.unary(-self.value, -T::one())
    }
}

impl<T: Scalar> Rem for Var<'_, T> {
    type Output = Self;
    fn rem(self, rhs: Self) -> Self {
        let q = (self.value / rhs.value).trunc();
        self.binary(rhs, self.value % rhs.value, T::one(), -q)
    }
}

impl<T: Scalar> AddAssign for Var<'_, T> {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}
impl<T: Scalar> SubAssign for Var<'_, T> {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}
impl<T: Scalar> MulAssign for Var<'_, T> {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}
impl<T: Scalar> DivAssign for Var<'_, T> {
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}
impl<T: Scalar> RemAssign for Var<'_, T> {
    fn rem_assign(&mut self, rhs: Self) {
        *self = *self % rhs;
    }
}

impl<T: Scalar> Num for Var<'_, T> {
    type FromStrRadixErr = ();
    fn from_str_radix(str: &str, radix: u32) -> Result<Self, Self::FromStrRadixErr> {
        T::from_str_radix(str, radix)
            .map(Self::constant)
            .map_err(|_| ())
    }
}

impl<T: Scalar> ToPrimitive for Var<'_, T> {
    fn to_i64(&self) -> Option<i64> {
        self.value.to_i64()
    }
    fn to_u64(&self) -> Option<u64> {
        self.value.to_u64()
    }
    fn to_f64(&self) -> Option<f64> {
        self.value.to_f64()
    }
}

impl<T: Scalar> FromPrimitive for Var<'_, T> {
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

impl<T: Scalar> NumCast for Var<'_, T> {
    fn from<N: ToPrimitive>(n: N) -> Option<Self> {
        <T as NumCast>::from(n).map(Self::constant)
    }
}

impl<T: Scalar> Float for Var<'_, T> {
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
        self.value.is_nan()
    }
    fn is_infinite(self) -> bool {
        self.value.is_infinite()
    }
    fn is_finite(self) -> bool {
        self.value.is_finite()
    }
    fn is_normal(self) -> bool {
        self.value.is_normal()
    }
    fn classify(self) -> std::num::FpCategory {
        self.value.classify()
    }
    // Piecewise-constant functions detach from the tape.
    fn floor(self) -> Self {
        Self::constant(self.value.floor())
    }
    fn ceil(self) -> Self {
        Self::constant(self.value.ceil())
    }
    fn round(self) -> Self {
        Self::constant(self.value.round())
    }
    fn trunc(self) -> Self {
        Self::constant(self.value.trunc())
    }
    fn fract(self) -> Self {
        self.unary(self.value.fract(), T::one())
    }
    fn abs(self) -> Self {
        if self.value >= T::zero() {
            self
        } else {
            -self
        }
    }
    fn signum(self) -> Self {
        Self::constant(self.value.signum())
    }
    fn is_sign_positive(self) -> bool {
        self.value.is_sign_positive()
    }
    fn is_sign_negative(self) -> bool {
        self.value.is_sign_negative()
    }
    fn mul_add(self, a: Self, b: Self) -> Self {
        self * a + b
    }
    fn recip(self) -> Self {
        let r = self.value.recip();
        self.unary(r, -(r * r))
    }
    fn powi(self, n: i32) -> Self {
        if n == 0 {
            return Self::one();
        }
        let weight = T::lift(<f64 as From<i32>>::from(n)) * self.value.powi(n - 1);
        self.unary(self.value.powi(n), weight)
    }
    fn powf(self, n: Self) -> Self {
        let p = self.value.powf(n.value);
        let base_weight = n.value * self.value.powf(n.value - T::one());
        if n.is_tracked() {
            self.binary(n, p, base_weight, p * self.value.ln())
        } else {
            self.unary(p, base_weight)
        }
    }
    fn sqrt(self) -> Self {
        let s = self.value.sqrt();
        self.unary(s, (s + s).recip())
    }
    fn exp(self) -> Self {
        let e = self.value.exp();
        self.unary(e, e)
    }
    fn exp2(self) -> Self {
        let e = self.value.exp2();
        self.unary(e, e * T::lift(std::f64::consts::LN_2))
    }
    fn ln(self) -> Self {
        self.unary(self.value.ln(), self.value.recip())
    }
    fn log(self, base: Self) -> Self {
        self.ln() / base.ln()
    }
    fn log2(self) -> Self {
        let weight = (self.value * T::lift(std::f64::consts::LN_2)).recip();
        self.unary(self.value.log2(), weight)
    }
    fn log10(self) -> Self {
        let weight = (self.value * T::lift(std::f64::consts::LN_10)).recip();
        self.unary(self.value.log10(), weight)
    }
    fn max(self, other: Self) -> Self {
        if self.value > other.value {
            self
        } else {
            other
        }
    }
    fn min(self, other: Self) -> Self {
        if self.value < other.value {
            self
        } else {
            other
        }
    }
    fn abs_sub(self, other: Self) -> Self {
        if self.value > other.value {
            self - other
        } else {
            Self::zero()
        }
    }
    fn cbrt(self) -> Self {
        let c = self.value.cbrt();
        self.unary(c, (T::lift(3.0) * c * c).recip())
    }
    fn hypot(self, other: Self) -> Self {
        let h = self.value.hypot(other.value);
        if h.is_zero() {
            return self.binary(other, h, T::zero(), T::zero());
        }
        self.binary(other, h, self.value / h, other.value / h)
    }
    fn sin(self) -> Self {
        self.unary(self.value.sin(), self.value.cos())
    }
    fn cos(self) -> Self {
        self.unary(self.value.cos(), -self.value.sin())
    }
    fn tan(self) -> Self {
        let t = self.value.tan();
        self.unary(t, T::one() + t * t)
    }
    fn asin(self) -> Self {
        let weight = (T::one() - self.value * self.value).sqrt().recip();
        self.unary(self.value.asin(), weight)
    }
    fn acos(self) -> Self {
        let weight = -(T::one() - self.value * self.value).sqrt().recip();
        self.unary(self.value.acos(), weight)
    }
    fn atan(self) -> Self {
        let weight = (T::one() + self.value * self.value).recip();
        self.unary(self.value.atan(), weight)
    }
    fn atan2(self, other: Self) -> Self {
        // self = y, other = x
        let denom = self.value * self.value + other.value * other.value;
        self.binary(
            other,
            self.value.atan2(other.value),
            other.value / denom,
            -self.value / denom,
        )
    }
    fn sin_cos(self) -> (Self, Self) {
        (self.sin(), self.cos())
    }
    fn exp_m1(self) -> Self {
        self.unary(self.value.exp_m1(), self.value.exp())
    }
    fn ln_1p(self) -> Self {
        self.unary(self.value.ln_1p(), (T::one() + self.value).recip())
    }
    fn sinh(self) -> Self {
        self.unary(self.value.sinh(), self.value.cosh())
    }
    fn cosh(self) -> Self {
        self.unary(self.value.cosh(), self.value.sinh())
    }
    fn tanh(self) -> Self {
        let t = self.value.tanh();
        self.unary(t, T::one() - t * t)
    }
    fn asinh(self) -> Self {
        let weight = (self.value * self.value + T::one()).sqrt().recip();
        self.unary(self.value.asinh(), weight)
    }
    fn acosh(self) -> Self {
        let weight = (self.value * self.value - T::one()).sqrt().recip();
        self.unary(self.value.acosh(), weight)
    }
    fn atanh(self) -> Self {
        let weight = (T::one() - self.value * self.value).recip();
        self.unary(self.value.atanh(), weight)
    }
    fn integer_decode(self) -> (u64, i16, i8) {
        self.value.integer_decode()
    }
}
