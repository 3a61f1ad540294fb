use crate::error::{DecodeError, EncodeError, EvalError, RenderError};
use crate::eval::{CellValueSource, EvalContext, Evaluator};
use crate::ftab::function_by_index;
use crate::render::{render_tokens, RenderContext};
use crate::rgce::{decode_rgce, encode_rgce, EncodedRgce};
use crate::token::{AreaRef, CellRef, Control, Reference, Token};
use crate::value::ValueEval;

/// A parsed formula: tokens in reverse Polish order, immutable once built.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Formula {
    tokens: Vec<Token>,
}

impl Formula {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn into_tokens(self) -> Vec<Token> {
        self.tokens
    }

    /// Decode `cce` bytes of `rgce` followed by any trailing `rgcb` payload in `bytes`.
    pub fn decode(bytes: &[u8], cce: usize) -> Result<Self, DecodeError> {
        decode_rgce(bytes, cce).map(Self::new)
    }

    /// `rgce` immediately followed by `rgcb`. The `cce` a record stores is
    /// [`Formula::token_stream_len`].
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        Ok(self.encode_parts()?.to_bytes())
    }

    pub fn encode_parts(&self) -> Result<EncodedRgce, EncodeError> {
        encode_rgce(&self.tokens)
    }

    /// Evaluate for cell `A1` with default settings.
    pub fn evaluate<S: CellValueSource + ?Sized>(&self, source: &S) -> Result<ValueEval, EvalError> {
        Evaluator::new(source).evaluate(&self.tokens)
    }

    pub fn evaluate_at<S: CellValueSource + ?Sized>(
        &self,
        source: &S,
        ctx: EvalContext,
    ) -> Result<ValueEval, EvalError> {
        Evaluator::new(source).with_context(ctx).evaluate(&self.tokens)
    }

    pub fn evaluate_with<S: CellValueSource + ?Sized>(
        &self,
        evaluator: &Evaluator<'_, S>,
    ) -> Result<ValueEval, EvalError> {
        evaluator.evaluate(&self.tokens)
    }

    /// The shared formula body as the cell at `(row, col)` sees it: `PtgRefN` / `PtgAreaN`
    /// become absolute `PtgRef` / `PtgArea`, or `PtgRefErr` / `PtgAreaErr` when the shifted
    /// address leaves the grid. Both forms have the same size, so `PtgMem*` lengths stay valid.
    pub fn materialize_shared(&self, row: u32, col: u32) -> Formula {
        let place = |cell: &CellRef| {
            cell.resolve_offset(row, col).map(|(r, c)| CellRef {
                row: r as u16,
                col: c as u16,
                ..*cell
            })
        };
        let tokens = self
            .tokens
            .iter()
            .map(|token| match token {
                Token::Reference {
                    reference: Reference::CellN(cell),
                    class,
                } => Token::reference(
                    place(cell).map_or(Reference::CellErr, Reference::Cell),
                    *class,
                ),
                Token::Reference {
                    reference: Reference::AreaN(area),
                    class,
                } => {
                    let reference = match (place(&area.first), place(&area.last)) {
                        (Some(first), Some(last)) => Reference::Area(AreaRef::new(first, last)),
                        _ => Reference::AreaErr,
                    };
                    Token::reference(reference, *class)
                }
                other => other.clone(),
            })
            .collect();
        Formula::new(tokens)
    }

    pub fn to_formula_text(&self, ctx: &dyn RenderContext) -> Result<String, RenderError> {
        render_tokens(&self.tokens, ctx)
    }

    /// Marked `tAttrVolatile`, or calls a volatile function.
    pub fn is_volatile(&self) -> bool {
        self.tokens.iter().any(|token| match token {
            Token::Control(Control::Attr(attr)) => attr.is_volatile(),
            Token::Function { call, .. } => {
                function_by_index(call.index()).is_some_and(|meta| meta.volatile)
            }
            _ => false,
        })
    }

    /// Anchor cell of the shared formula this cell points at (a lone leading `PtgExp`).
    pub fn shared_formula_anchor(&self) -> Option<(u16, u16)> {
        match self.tokens.first() {
            Some(Token::Control(Control::Exp { row, col })) => Some((*row, *col)),
            _ => None,
        }
    }

    /// Bytes of the primary token stream (`cce`).
    pub fn token_stream_len(&self) -> usize {
        self.tokens.iter().map(Token::in_stream_size).sum()
    }
}

impl From<Vec<Token>> for Formula {
    fn from(tokens: Vec<Token>) -> Self {
        Self::new(tokens)
    }
}

impl FromIterator<Token> for Formula {
    fn from_iter<I: IntoIterator<Item = Token>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
