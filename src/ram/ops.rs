// Copyright 2025 Ramble Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Operator enumerations of the RAM language
//!
//! Operators come in four type codes: signed (no prefix), unsigned (`U`),
//! float (`F`), and symbol (`S`). The engine reinterprets its untyped
//! domain words according to the operator's code, applies the native
//! operation, and reinterprets the result back.

/// Attribute type codes for functor signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeAttribute {
    Signed,
    Unsigned,
    Float,
    Symbol,
}

/// Intrinsic expression operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctorOp {
    /// Ordinal of a symbol: the identity on the handle.
    Ord,
    /// Length of the decoded symbol.
    StrLen,
    Neg,
    FNeg,
    BNot,
    UBNot,
    LNot,
    ULNot,

    // Identity coercions.
    F2F,
    I2I,
    U2U,
    S2S,

    // Numeric coercions, host C semantics (float→int truncates toward zero).
    F2I,
    F2U,
    I2U,
    I2F,
    U2I,
    U2F,

    // Numeric ↔ string conversions in base 10.
    F2S,
    I2S,
    U2S,
    S2F,
    S2I,
    S2U,

    Add,
    UAdd,
    FAdd,
    Sub,
    USub,
    FSub,
    Mul,
    UMul,
    FMul,
    Div,
    UDiv,
    FDiv,
    Exp,
    UExp,
    FExp,
    Mod,
    UMod,
    BAnd,
    UBAnd,
    BOr,
    UBOr,
    BXor,
    UBXor,
    BShiftL,
    UBShiftL,
    BShiftR,
    UBShiftR,
    BShiftRUnsigned,
    UBShiftRUnsigned,
    LAnd,
    ULAnd,
    LOr,
    ULOr,
    LXor,
    ULXor,

    // Variadic extrema.
    Max,
    UMax,
    FMax,
    Min,
    UMin,
    FMin,
    /// Lexicographic maximum over decoded symbols.
    SMax,
    /// Lexicographic minimum over decoded symbols.
    SMin,

    /// Variadic concatenation of decoded symbols.
    Cat,
    /// Two-operand concatenation of decoded symbols.
    SSAdd,
    /// `substr(s, i, n)`.
    Substr,
}

impl FunctorOp {
    /// Operator name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            FunctorOp::Ord => "ord",
            FunctorOp::StrLen => "strlen",
            FunctorOp::Neg => "neg",
            FunctorOp::FNeg => "fneg",
            FunctorOp::BNot => "bnot",
            FunctorOp::UBNot => "ubnot",
            FunctorOp::LNot => "lnot",
            FunctorOp::ULNot => "ulnot",
            FunctorOp::F2F => "f2f",
            FunctorOp::I2I => "i2i",
            FunctorOp::U2U => "u2u",
            FunctorOp::S2S => "s2s",
            FunctorOp::F2I => "f2i",
            FunctorOp::F2U => "f2u",
            FunctorOp::I2U => "i2u",
            FunctorOp::I2F => "i2f",
            FunctorOp::U2I => "u2i",
            FunctorOp::U2F => "u2f",
            FunctorOp::F2S => "f2s",
            FunctorOp::I2S => "i2s",
            FunctorOp::U2S => "u2s",
            FunctorOp::S2F => "s2f",
            FunctorOp::S2I => "s2i",
            FunctorOp::S2U => "s2u",
            FunctorOp::Add => "add",
            FunctorOp::UAdd => "uadd",
            FunctorOp::FAdd => "fadd",
            FunctorOp::Sub => "sub",
            FunctorOp::USub => "usub",
            FunctorOp::FSub => "fsub",
            FunctorOp::Mul => "mul",
            FunctorOp::UMul => "umul",
            FunctorOp::FMul => "fmul",
            FunctorOp::Div => "div",
            FunctorOp::UDiv => "udiv",
            FunctorOp::FDiv => "fdiv",
            FunctorOp::Exp => "exp",
            FunctorOp::UExp => "uexp",
            FunctorOp::FExp => "fexp",
            FunctorOp::Mod => "mod",
            FunctorOp::UMod => "umod",
            FunctorOp::BAnd => "band",
            FunctorOp::UBAnd => "uband",
            FunctorOp::BOr => "bor",
            FunctorOp::UBOr => "ubor",
            FunctorOp::BXor => "bxor",
            FunctorOp::UBXor => "ubxor",
            FunctorOp::BShiftL => "bshl",
            FunctorOp::UBShiftL => "ubshl",
            FunctorOp::BShiftR => "bshr",
            FunctorOp::UBShiftR => "ubshr",
            FunctorOp::BShiftRUnsigned => "bshru",
            FunctorOp::UBShiftRUnsigned => "ubshru",
            FunctorOp::LAnd => "land",
            FunctorOp::ULAnd => "uland",
            FunctorOp::LOr => "lor",
            FunctorOp::ULOr => "ulor",
            FunctorOp::LXor => "lxor",
            FunctorOp::ULXor => "ulxor",
            FunctorOp::Max => "max",
            FunctorOp::UMax => "umax",
            FunctorOp::FMax => "fmax",
            FunctorOp::Min => "min",
            FunctorOp::UMin => "umin",
            FunctorOp::FMin => "fmin",
            FunctorOp::SMax => "smax",
            FunctorOp::SMin => "smin",
            FunctorOp::Cat => "cat",
            FunctorOp::SSAdd => "ssadd",
            FunctorOp::Substr => "substr",
        }
    }
}

/// Binary comparison and matching operators used in constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintOp {
    /// Bitwise-domain equality.
    Eq,
    FEq,
    Ne,
    FNe,
    Lt,
    ULt,
    FLt,
    /// Lexicographic comparison of decoded symbols.
    SLt,
    Le,
    ULe,
    FLe,
    SLe,
    Gt,
    UGt,
    FGt,
    SGt,
    Ge,
    UGe,
    FGe,
    SGe,
    /// Full-string regex match: `match(pattern, text)`.
    Match,
    NotMatch,
    /// Decoded substring test: `contains(needle, haystack)`.
    Contains,
    NotContains,
}

impl ConstraintOp {
    /// Operator name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            ConstraintOp::Eq => "eq",
            ConstraintOp::FEq => "feq",
            ConstraintOp::Ne => "ne",
            ConstraintOp::FNe => "fne",
            ConstraintOp::Lt => "lt",
            ConstraintOp::ULt => "ult",
            ConstraintOp::FLt => "flt",
            ConstraintOp::SLt => "slt",
            ConstraintOp::Le => "le",
            ConstraintOp::ULe => "ule",
            ConstraintOp::FLe => "fle",
            ConstraintOp::SLe => "sle",
            ConstraintOp::Gt => "gt",
            ConstraintOp::UGt => "ugt",
            ConstraintOp::FGt => "fgt",
            ConstraintOp::SGt => "sgt",
            ConstraintOp::Ge => "ge",
            ConstraintOp::UGe => "uge",
            ConstraintOp::FGe => "fge",
            ConstraintOp::SGe => "sge",
            ConstraintOp::Match => "match",
            ConstraintOp::NotMatch => "not_match",
            ConstraintOp::Contains => "contains",
            ConstraintOp::NotContains => "not_contains",
        }
    }
}

/// Intrinsic summary functions for aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateOp {
    Min,
    UMin,
    FMin,
    Max,
    UMax,
    FMax,
    Sum,
    USum,
    FSum,
    Mean,
    Count,
}

/// Range generators. These are loop nodes, not plain expressions: they
/// bind each generated value to a tuple slot and run a nested operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NestedOp {
    Range,
    URange,
    FRange,
}
