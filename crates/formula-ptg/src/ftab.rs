//! BIFF built-in function table.
//!
//! `PtgFunc` / `PtgFuncVar` name a function by its 16-bit `iftab`. The ids, arity bounds and
//! operand classes below follow the published BIFF8 function table; the table is static data
//! and is never extended at runtime.
//!
//! Parameter classes list one entry per declared parameter. Calls with more arguments than
//! entries reuse the last entry (e.g. every argument of `SUM` is reference-class).

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::token::OperandClass;

/// `iftab` of the add-in / user-defined function dispatcher. Its first argument is the name of
/// the function being called.
pub const FTAB_USER_DEFINED: u16 = 255;

/// Most arguments a BIFF8 function call can carry.
pub const MAX_BIFF8_ARGS: u8 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionMetadata {
    pub index: u16,
    pub name: &'static str,
    pub min_params: u8,
    pub max_params: u8,
    pub return_class: OperandClass,
    pub parameter_classes: &'static [OperandClass],
    pub volatile: bool,
}

impl FunctionMetadata {
    const fn new(
        index: u16,
        name: &'static str,
        min_params: u8,
        max_params: u8,
        return_class: OperandClass,
        parameter_classes: &'static [OperandClass],
    ) -> Self {
        Self {
            index,
            name,
            min_params,
            max_params,
            return_class,
            parameter_classes,
            volatile: false,
        }
    }

    const fn volatile(mut self) -> Self {
        self.volatile = true;
        self
    }

    /// Whether `PtgFunc` can call this function (its argument count is implied).
    pub fn has_fixed_arity(&self) -> bool {
        self.min_params == self.max_params
    }

    pub fn accepts(&self, argc: usize) -> bool {
        (self.min_params as usize..=self.max_params as usize).contains(&argc)
    }

    /// Expected class of the argument at `position` (zero-based).
    pub fn parameter_class(&self, position: usize) -> OperandClass {
        self.parameter_classes
            .get(position)
            .or(self.parameter_classes.last())
            .copied()
            .unwrap_or(OperandClass::Value)
    }
}

const R: OperandClass = OperandClass::Reference;
const V: OperandClass = OperandClass::Value;
const A: OperandClass = OperandClass::Array;

use FunctionMetadata as F;

const N: u8 = MAX_BIFF8_ARGS;

/// Sorted by `index`.
static FUNCTIONS: &[FunctionMetadata] = &[
    F::new(0, "COUNT", 0, N, V, &[R]),
    F::new(1, "IF", 2, 3, R, &[V, R]),
    F::new(2, "ISNA", 1, 1, V, &[V]),
    F::new(3, "ISERROR", 1, 1, V, &[V]),
    F::new(4, "SUM", 0, N, V, &[R]),
    F::new(5, "AVERAGE", 1, N, V, &[R]),
    F::new(6, "MIN", 1, N, V, &[R]),
    F::new(7, "MAX", 1, N, V, &[R]),
    F::new(8, "ROW", 0, 1, V, &[R]),
    F::new(9, "COLUMN", 0, 1, V, &[R]),
    F::new(10, "NA", 0, 0, V, &[]),
    F::new(11, "NPV", 2, N, V, &[V, R]),
    F::new(12, "STDEV", 1, N, V, &[R]),
    F::new(13, "DOLLAR", 1, 2, V, &[V]),
    F::new(14, "FIXED", 1, 3, V, &[V]),
    F::new(15, "SIN", 1, 1, V, &[V]),
    F::new(16, "COS", 1, 1, V, &[V]),
    F::new(17, "TAN", 1, 1, V, &[V]),
    F::new(18, "ATAN", 1, 1, V, &[V]),
    F::new(19, "PI", 0, 0, V, &[]),
    F::new(20, "SQRT", 1, 1, V, &[V]),
    F::new(21, "EXP", 1, 1, V, &[V]),
    F::new(22, "LN", 1, 1, V, &[V]),
    F::new(23, "LOG10", 1, 1, V, &[V]),
    F::new(24, "ABS", 1, 1, V, &[V]),
    F::new(25, "INT", 1, 1, V, &[V]),
    F::new(26, "SIGN", 1, 1, V, &[V]),
    F::new(27, "ROUND", 2, 2, V, &[V]),
    F::new(28, "LOOKUP", 2, 3, V, &[V, R]),
    F::new(29, "INDEX", 2, 4, R, &[R, V]),
    F::new(30, "REPT", 2, 2, V, &[V]),
    F::new(31, "MID", 3, 3, V, &[V]),
    F::new(32, "LEN", 1, 1, V, &[V]),
    F::new(33, "VALUE", 1, 1, V, &[V]),
    F::new(34, "TRUE", 0, 0, V, &[]),
    F::new(35, "FALSE", 0, 0, V, &[]),
    F::new(36, "AND", 1, N, V, &[R]),
    F::new(37, "OR", 1, N, V, &[R]),
    F::new(38, "NOT", 1, 1, V, &[V]),
    F::new(39, "MOD", 2, 2, V, &[V]),
    F::new(40, "DCOUNT", 3, 3, V, &[R]),
    F::new(41, "DSUM", 3, 3, V, &[R]),
    F::new(42, "DAVERAGE", 3, 3, V, &[R]),
    F::new(43, "DMIN", 3, 3, V, &[R]),
    F::new(44, "DMAX", 3, 3, V, &[R]),
    F::new(45, "DSTDEV", 3, 3, V, &[R]),
    F::new(46, "VAR", 1, N, V, &[R]),
    F::new(47, "DVAR", 3, 3, V, &[R]),
    F::new(48, "TEXT", 2, 2, V, &[V]),
    F::new(49, "LINEST", 1, 4, A, &[R, R, V, V]),
    F::new(50, "TREND", 1, 4, A, &[R, R, R, V]),
    F::new(51, "LOGEST", 1, 4, A, &[R, R, V, V]),
    F::new(52, "GROWTH", 1, 4, A, &[R, R, R, V]),
    F::new(56, "PV", 3, 5, V, &[V]),
    F::new(57, "FV", 3, 5, V, &[V]),
    F::new(58, "NPER", 3, 5, V, &[V]),
    F::new(59, "PMT", 3, 5, V, &[V]),
    F::new(60, "RATE", 3, 6, V, &[V]),
    F::new(61, "MIRR", 3, 3, V, &[R, V]),
    F::new(62, "IRR", 1, 2, V, &[R, V]),
    F::new(63, "RAND", 0, 0, V, &[]).volatile(),
    F::new(64, "MATCH", 2, 3, V, &[V, R, R]),
    F::new(65, "DATE", 3, 3, V, &[V]),
    F::new(66, "TIME", 3, 3, V, &[V]),
    F::new(67, "DAY", 1, 1, V, &[V]),
    F::new(68, "MONTH", 1, 1, V, &[V]),
    F::new(69, "YEAR", 1, 1, V, &[V]),
    F::new(70, "WEEKDAY", 1, 2, V, &[V]),
    F::new(71, "HOUR", 1, 1, V, &[V]),
    F::new(72, "MINUTE", 1, 1, V, &[V]),
    F::new(73, "SECOND", 1, 1, V, &[V]),
    F::new(74, "NOW", 0, 0, V, &[]).volatile(),
    F::new(75, "AREAS", 1, 1, V, &[R]),
    F::new(76, "ROWS", 1, 1, V, &[R]),
    F::new(77, "COLUMNS", 1, 1, V, &[R]),
    F::new(78, "OFFSET", 3, 5, R, &[R, V]).volatile(),
    F::new(82, "SEARCH", 2, 3, V, &[V]),
    F::new(83, "TRANSPOSE", 1, 1, A, &[A]),
    F::new(86, "TYPE", 1, 1, V, &[V]),
    F::new(97, "ATAN2", 2, 2, V, &[V]),
    F::new(98, "ASIN", 1, 1, V, &[V]),
    F::new(99, "ACOS", 1, 1, V, &[V]),
    F::new(100, "CHOOSE", 2, N, R, &[V, R]),
    F::new(101, "HLOOKUP", 3, 4, V, &[V, R, R, V]),
    F::new(102, "VLOOKUP", 3, 4, V, &[V, R, R, V]),
    F::new(105, "ISREF", 1, 1, V, &[R]),
    F::new(109, "LOG", 1, 2, V, &[V]),
    F::new(111, "CHAR", 1, 1, V, &[V]),
    F::new(112, "LOWER", 1, 1, V, &[V]),
    F::new(113, "UPPER", 1, 1, V, &[V]),
    F::new(114, "PROPER", 1, 1, V, &[V]),
    F::new(115, "LEFT", 1, 2, V, &[V]),
    F::new(116, "RIGHT", 1, 2, V, &[V]),
    F::new(117, "EXACT", 2, 2, V, &[V]),
    F::new(118, "TRIM", 1, 1, V, &[V]),
    F::new(119, "REPLACE", 4, 4, V, &[V]),
    F::new(120, "SUBSTITUTE", 3, 4, V, &[V]),
    F::new(121, "CODE", 1, 1, V, &[V]),
    F::new(124, "FIND", 2, 3, V, &[V]),
    F::new(125, "CELL", 1, 2, V, &[V, R]).volatile(),
    F::new(126, "ISERR", 1, 1, V, &[V]),
    F::new(127, "ISTEXT", 1, 1, V, &[V]),
    F::new(128, "ISNUMBER", 1, 1, V, &[V]),
    F::new(129, "ISBLANK", 1, 1, V, &[V]),
    F::new(130, "T", 1, 1, V, &[R]),
    F::new(131, "N", 1, 1, V, &[R]),
    F::new(140, "DATEVALUE", 1, 1, V, &[V]),
    F::new(141, "TIMEVALUE", 1, 1, V, &[V]),
    F::new(142, "SLN", 3, 3, V, &[V]),
    F::new(143, "SYD", 4, 4, V, &[V]),
    F::new(144, "DDB", 4, 5, V, &[V]),
    F::new(148, "INDIRECT", 1, 2, R, &[V]).volatile(),
    F::new(162, "CLEAN", 1, 1, V, &[V]),
    F::new(163, "MDETERM", 1, 1, V, &[A]),
    F::new(164, "MINVERSE", 1, 1, A, &[A]),
    F::new(165, "MMULT", 2, 2, A, &[A]),
    F::new(167, "IPMT", 4, 6, V, &[V]),
    F::new(168, "PPMT", 4, 6, V, &[V]),
    F::new(169, "COUNTA", 0, N, V, &[R]),
    F::new(183, "PRODUCT", 0, N, V, &[R]),
    F::new(184, "FACT", 1, 1, V, &[V]),
    F::new(189, "DPRODUCT", 3, 3, V, &[R]),
    F::new(190, "ISNONTEXT", 1, 1, V, &[V]),
    F::new(193, "STDEVP", 1, N, V, &[R]),
    F::new(194, "VARP", 1, N, V, &[R]),
    F::new(195, "DSTDEVP", 3, 3, V, &[R]),
    F::new(196, "DVARP", 3, 3, V, &[R]),
    F::new(197, "TRUNC", 1, 2, V, &[V]),
    F::new(198, "ISLOGICAL", 1, 1, V, &[V]),
    F::new(199, "DCOUNTA", 3, 3, V, &[R]),
    F::new(212, "ROUNDUP", 2, 2, V, &[V]),
    F::new(213, "ROUNDDOWN", 2, 2, V, &[V]),
    F::new(216, "RANK", 2, 3, V, &[V, R, V]),
    F::new(219, "ADDRESS", 2, 5, V, &[V]),
    F::new(220, "DAYS360", 2, 3, V, &[V]),
    F::new(221, "TODAY", 0, 0, V, &[]).volatile(),
    F::new(222, "VDB", 5, 7, V, &[V]),
    F::new(227, "MEDIAN", 1, N, V, &[R]),
    F::new(228, "SUMPRODUCT", 1, N, V, &[A]),
    F::new(229, "SINH", 1, 1, V, &[V]),
    F::new(230, "COSH", 1, 1, V, &[V]),
    F::new(231, "TANH", 1, 1, V, &[V]),
    F::new(232, "ASINH", 1, 1, V, &[V]),
    F::new(233, "ACOSH", 1, 1, V, &[V]),
    F::new(234, "ATANH", 1, 1, V, &[V]),
    F::new(244, "INFO", 1, 1, V, &[V]).volatile(),
    F::new(247, "DB", 4, 5, V, &[V]),
    F::new(252, "FREQUENCY", 2, 2, A, &[R]),
    F::new(FTAB_USER_DEFINED, "USER", 1, N, R, &[R]),
    F::new(261, "ERROR.TYPE", 1, 1, V, &[V]),
    F::new(269, "AVEDEV", 1, N, V, &[R]),
    F::new(270, "BETADIST", 3, 5, V, &[V]),
    F::new(271, "GAMMALN", 1, 1, V, &[V]),
    F::new(272, "BETAINV", 3, 5, V, &[V]),
    F::new(273, "BINOMDIST", 4, 4, V, &[V]),
    F::new(274, "CHIDIST", 2, 2, V, &[V]),
    F::new(275, "CHIINV", 2, 2, V, &[V]),
    F::new(276, "COMBIN", 2, 2, V, &[V]),
    F::new(277, "CONFIDENCE", 3, 3, V, &[V]),
    F::new(278, "CRITBINOM", 3, 3, V, &[V]),
    F::new(279, "EVEN", 1, 1, V, &[V]),
    F::new(280, "EXPONDIST", 3, 3, V, &[V]),
    F::new(281, "FDIST", 3, 3, V, &[V]),
    F::new(282, "FINV", 3, 3, V, &[V]),
    F::new(283, "FISHER", 1, 1, V, &[V]),
    F::new(284, "FISHERINV", 1, 1, V, &[V]),
    F::new(285, "FLOOR", 2, 2, V, &[V]),
    F::new(286, "GAMMADIST", 4, 4, V, &[V]),
    F::new(287, "GAMMAINV", 3, 3, V, &[V]),
    F::new(288, "CEILING", 2, 2, V, &[V]),
    F::new(289, "HYPGEOMDIST", 4, 4, V, &[V]),
    F::new(290, "LOGNORMDIST", 3, 3, V, &[V]),
    F::new(291, "LOGINV", 3, 3, V, &[V]),
    F::new(292, "NEGBINOMDIST", 3, 3, V, &[V]),
    F::new(293, "NORMDIST", 4, 4, V, &[V]),
    F::new(294, "NORMSDIST", 1, 1, V, &[V]),
    F::new(295, "NORMINV", 3, 3, V, &[V]),
    F::new(296, "NORMSINV", 1, 1, V, &[V]),
    F::new(297, "STANDARDIZE", 3, 3, V, &[V]),
    F::new(298, "ODD", 1, 1, V, &[V]),
    F::new(299, "PERMUT", 2, 2, V, &[V]),
    F::new(300, "POISSON", 3, 3, V, &[V]),
    F::new(301, "TDIST", 3, 3, V, &[V]),
    F::new(302, "WEIBULL", 4, 4, V, &[V]),
    F::new(303, "SUMXMY2", 2, 2, V, &[A]),
    F::new(304, "SUMX2MY2", 2, 2, V, &[A]),
    F::new(305, "SUMX2PY2", 2, 2, V, &[A]),
    F::new(306, "CHITEST", 2, 2, V, &[A]),
    F::new(307, "CORREL", 2, 2, V, &[A]),
    F::new(308, "COVAR", 2, 2, V, &[A]),
    F::new(309, "FORECAST", 3, 3, V, &[V, A]),
    F::new(310, "FTEST", 2, 2, V, &[A]),
    F::new(311, "INTERCEPT", 2, 2, V, &[A]),
    F::new(312, "PEARSON", 2, 2, V, &[A]),
    F::new(313, "RSQ", 2, 2, V, &[A]),
    F::new(314, "STEYX", 2, 2, V, &[A]),
    F::new(315, "SLOPE", 2, 2, V, &[A]),
    F::new(316, "TTEST", 4, 4, V, &[A, A, V]),
    F::new(317, "PROB", 3, 4, V, &[A, A, V]),
    F::new(318, "DEVSQ", 1, N, V, &[R]),
    F::new(319, "GEOMEAN", 1, N, V, &[R]),
    F::new(320, "HARMEAN", 1, N, V, &[R]),
    F::new(321, "SUMSQ", 0, N, V, &[R]),
    F::new(322, "KURT", 1, N, V, &[R]),
    F::new(323, "SKEW", 1, N, V, &[R]),
    F::new(324, "ZTEST", 2, 3, V, &[R, V]),
    F::new(325, "LARGE", 2, 2, V, &[R, V]),
    F::new(326, "SMALL", 2, 2, V, &[R, V]),
    F::new(327, "QUARTILE", 2, 2, V, &[R, V]),
    F::new(328, "PERCENTILE", 2, 2, V, &[R, V]),
    F::new(329, "PERCENTRANK", 2, 3, V, &[R, V]),
    F::new(330, "MODE", 1, N, V, &[A]),
    F::new(331, "TRIMMEAN", 2, 2, V, &[R, V]),
    F::new(332, "TINV", 2, 2, V, &[V]),
    F::new(336, "CONCATENATE", 0, N, V, &[V]),
    F::new(337, "POWER", 2, 2, V, &[V]),
    F::new(342, "RADIANS", 1, 1, V, &[V]),
    F::new(343, "DEGREES", 1, 1, V, &[V]),
    F::new(344, "SUBTOTAL", 2, N, V, &[V, R]),
    F::new(345, "SUMIF", 2, 3, V, &[R, V, R]),
    F::new(346, "COUNTIF", 2, 2, V, &[R, V]),
    F::new(347, "COUNTBLANK", 1, 1, V, &[R]),
    F::new(354, "ROMAN", 1, 2, V, &[V]),
    F::new(359, "HYPERLINK", 1, 2, V, &[V]),
    F::new(361, "AVERAGEA", 1, N, V, &[R]),
    F::new(362, "MAXA", 1, N, V, &[R]),
    F::new(363, "MINA", 1, N, V, &[R]),
    F::new(364, "STDEVPA", 1, N, V, &[R]),
    F::new(365, "VARPA", 1, N, V, &[R]),
    F::new(366, "STDEVA", 1, N, V, &[R]),
    F::new(367, "VARA", 1, N, V, &[R]),
];

/// Process-wide, read-only view of the function table.
#[derive(Debug)]
pub struct FunctionMetadataRegistry {
    by_name: HashMap<&'static str, usize>,
}

impl FunctionMetadataRegistry {
    pub fn global() -> &'static FunctionMetadataRegistry {
        static REGISTRY: OnceLock<FunctionMetadataRegistry> = OnceLock::new();
        REGISTRY.get_or_init(|| {
            let mut by_name = HashMap::new();
            let _ = by_name.try_reserve(FUNCTIONS.len());
            for (pos, meta) in FUNCTIONS.iter().enumerate() {
                let prev = by_name.insert(meta.name, pos);
                debug_assert!(prev.is_none(), "duplicate function name {}", meta.name);
            }
            FunctionMetadataRegistry { by_name }
        })
    }

    pub fn by_index(&self, index: u16) -> Option<&'static FunctionMetadata> {
        FUNCTIONS
            .binary_search_by_key(&index, |meta| meta.index)
            .ok()
            .map(|pos| &FUNCTIONS[pos])
    }

    /// Case-insensitive (ASCII) lookup by function name.
    pub fn by_name(&self, name: &str) -> Option<&'static FunctionMetadata> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        // Function names are short; uppercase into a stack buffer to avoid allocating.
        let mut buf = [0u8; 32];
        let pos = if name.len() <= buf.len() {
            for (dst, src) in buf[..name.len()].iter_mut().zip(name.as_bytes()) {
                *dst = src.to_ascii_uppercase();
            }
            let upper = std::str::from_utf8(&buf[..name.len()]).ok()?;
            self.by_name.get(upper).copied()
        } else {
            self.by_name.get(name.to_ascii_uppercase().as_str()).copied()
        }?;
        FUNCTIONS.get(pos)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static FunctionMetadata> {
        FUNCTIONS.iter()
    }

    pub fn len(&self) -> usize {
        FUNCTIONS.len()
    }

    pub fn is_empty(&self) -> bool {
        FUNCTIONS.is_empty()
    }
}

pub fn function_by_index(index: u16) -> Option<&'static FunctionMetadata> {
    FunctionMetadataRegistry::global().by_index(index)
}

pub fn function_by_name(name: &str) -> Option<&'static FunctionMetadata> {
    FunctionMetadataRegistry::global().by_name(name)
}
