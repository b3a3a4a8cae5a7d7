#![forbid(unsafe_code)]

//! Classification flags for primary expressions.
//!
//! Every parsed primary expression classifies as exactly one base flag. A
//! specification lists the set of flags it accepts; composite constants such
//! as [`ExpressionType::ANY_KEY_PATH`] are plain unions of base flags so the
//! acceptance check stays a containment test.
//!
//! # Widening
//!
//! Some literal forms are acceptable under more than one flag. An integer
//! literal may stand in for a double or a generic number, and an unqualified
//! key path resolves against the data context. [`ExpressionType::candidates`]
//! lists, in preference order, the flags a classification may be accepted as.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Set of primary-expression shapes and constant kinds.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ExpressionType: u32 {
        const UNQUALIFIED_KEY_PATH      = 1 << 0;
        const DATA_CONTEXT_KEY_PATH     = 1 << 1;
        const ROOT_DATA_CONTEXT_KEY_PATH = 1 << 2;
        const CONTROL_KEY_PATH          = 1 << 3;

        const ARRAY                     = 1 << 5;

        const ENUM_CONSTANT             = 1 << 8;
        const OPTIONS_CONSTANT          = 1 << 9;
        const CLASS_CONSTANT            = 1 << 10;
        const STRING_CONSTANT           = 1 << 11;
        const NUMBER_CONSTANT           = 1 << 12;
        const BOOLEAN_CONSTANT          = 1 << 13;
        const INTEGER_CONSTANT          = 1 << 14;
        const DOUBLE_CONSTANT           = 1 << 15;
        const COLOR_CONSTANT            = 1 << 16;
        const POINT_CONSTANT            = 1 << 18;
        const SIZE_CONSTANT             = 1 << 19;
        const RECT_CONSTANT             = 1 << 20;
        const FONT_CONSTANT             = 1 << 21;

        const ANY_KEY_PATH = Self::DATA_CONTEXT_KEY_PATH.bits()
            | Self::ROOT_DATA_CONTEXT_KEY_PATH.bits()
            | Self::CONTROL_KEY_PATH.bits();

        const CLASS   = Self::ANY_KEY_PATH.bits() | Self::CLASS_CONSTANT.bits();
        const STRING  = Self::ANY_KEY_PATH.bits() | Self::STRING_CONSTANT.bits();
        const BOOLEAN = Self::ANY_KEY_PATH.bits() | Self::BOOLEAN_CONSTANT.bits();
        const INTEGER = Self::ANY_KEY_PATH.bits() | Self::INTEGER_CONSTANT.bits();
        const DOUBLE  = Self::ANY_KEY_PATH.bits() | Self::DOUBLE_CONSTANT.bits();
        const NUMBER  = Self::ANY_KEY_PATH.bits() | Self::NUMBER_CONSTANT.bits();

        const ANY_COLOR_CONSTANT = Self::COLOR_CONSTANT.bits();

        const ANY_NUMBER_CONSTANT = Self::NUMBER_CONSTANT.bits()
            | Self::BOOLEAN_CONSTANT.bits()
            | Self::INTEGER_CONSTANT.bits()
            | Self::DOUBLE_CONSTANT.bits();

        const ANY_CONSTANT = Self::CLASS_CONSTANT.bits()
            | Self::STRING_CONSTANT.bits()
            | Self::ANY_NUMBER_CONSTANT.bits()
            | Self::ANY_COLOR_CONSTANT.bits()
            | Self::POINT_CONSTANT.bits()
            | Self::SIZE_CONSTANT.bits()
            | Self::RECT_CONSTANT.bits()
            | Self::FONT_CONSTANT.bits()
            | Self::ENUM_CONSTANT.bits()
            | Self::OPTIONS_CONSTANT.bits();

        const ANY = Self::UNQUALIFIED_KEY_PATH.bits()
            | Self::ANY_KEY_PATH.bits()
            | Self::ANY_CONSTANT.bits()
            | Self::ARRAY.bits();
    }
}

/// Base flag → flags it may be accepted as.
const WIDENING: &[(ExpressionType, &[ExpressionType])] = &[
    (
        ExpressionType::UNQUALIFIED_KEY_PATH,
        &[
            ExpressionType::UNQUALIFIED_KEY_PATH,
            ExpressionType::DATA_CONTEXT_KEY_PATH,
        ],
    ),
    (
        ExpressionType::DATA_CONTEXT_KEY_PATH,
        &[ExpressionType::DATA_CONTEXT_KEY_PATH],
    ),
    (
        ExpressionType::ROOT_DATA_CONTEXT_KEY_PATH,
        &[ExpressionType::ROOT_DATA_CONTEXT_KEY_PATH],
    ),
    (
        ExpressionType::CONTROL_KEY_PATH,
        &[ExpressionType::CONTROL_KEY_PATH],
    ),
    (ExpressionType::ARRAY, &[ExpressionType::ARRAY]),
    (ExpressionType::ENUM_CONSTANT, &[ExpressionType::ENUM_CONSTANT]),
    (
        ExpressionType::OPTIONS_CONSTANT,
        &[ExpressionType::OPTIONS_CONSTANT],
    ),
    (ExpressionType::CLASS_CONSTANT, &[ExpressionType::CLASS_CONSTANT]),
    (
        ExpressionType::STRING_CONSTANT,
        &[ExpressionType::STRING_CONSTANT],
    ),
    (
        ExpressionType::NUMBER_CONSTANT,
        &[ExpressionType::NUMBER_CONSTANT],
    ),
    (
        ExpressionType::BOOLEAN_CONSTANT,
        &[
            ExpressionType::BOOLEAN_CONSTANT,
            ExpressionType::NUMBER_CONSTANT,
        ],
    ),
    (
        ExpressionType::INTEGER_CONSTANT,
        &[
            ExpressionType::INTEGER_CONSTANT,
            ExpressionType::NUMBER_CONSTANT,
            ExpressionType::DOUBLE_CONSTANT,
        ],
    ),
    (
        ExpressionType::DOUBLE_CONSTANT,
        &[
            ExpressionType::DOUBLE_CONSTANT,
            ExpressionType::NUMBER_CONSTANT,
        ],
    ),
    (ExpressionType::COLOR_CONSTANT, &[ExpressionType::COLOR_CONSTANT]),
    (ExpressionType::POINT_CONSTANT, &[ExpressionType::POINT_CONSTANT]),
    (ExpressionType::SIZE_CONSTANT, &[ExpressionType::SIZE_CONSTANT]),
    (ExpressionType::RECT_CONSTANT, &[ExpressionType::RECT_CONSTANT]),
    (ExpressionType::FONT_CONSTANT, &[ExpressionType::FONT_CONSTANT]),
];

impl Default for ExpressionType {
    fn default() -> Self {
        Self::ANY
    }
}

impl ExpressionType {
    /// Flags this classification may be accepted as, most specific first.
    ///
    /// `self` is expected to be a single base flag; anything else has no
    /// candidates.
    #[must_use]
    pub fn candidates(self) -> &'static [ExpressionType] {
        WIDENING
            .iter()
            .find(|(flag, _)| *flag == self)
            .map(|(_, candidates)| *candidates)
            .unwrap_or(&[])
    }

    /// The first flag in [`candidates`](Self::candidates) that `allowed` contains.
    #[must_use]
    pub fn accepted_as(self, allowed: ExpressionType) -> Option<ExpressionType> {
        self.candidates()
            .iter()
            .copied()
            .find(|candidate| allowed.contains(*candidate))
    }

    /// Whether this set names any key path kind.
    #[must_use]
    pub fn is_key_path(self) -> bool {
        self.intersects(Self::UNQUALIFIED_KEY_PATH | Self::ANY_KEY_PATH)
    }
}
