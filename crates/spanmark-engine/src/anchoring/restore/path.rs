//! Layer 2: structural element paths.

use crate::anchoring::model::EndPath;
use crate::tree::{Bias, Boundary, Span, TreeAdapter};

use super::{LayerOutcome, RestoreContext};

pub(super) fn attempt<T: TreeAdapter + ?Sized>(ctx: &RestoreContext<'_, T>) -> LayerOutcome {
    let paths = &ctx.saved.restore.paths;
    let start = match resolve(ctx.tree, &paths.start, Bias::Forward) {
        Ok(boundary) => boundary,
        Err(detail) => return LayerOutcome::failed(detail),
    };
    let end = match resolve(ctx.tree, &paths.end, Bias::Backward) {
        Ok(boundary) => boundary,
        Err(detail) => return LayerOutcome::failed(detail),
    };
    LayerOutcome::found(Span::new(start, end), "resolved by path")
}

fn resolve<T: TreeAdapter + ?Sized>(tree: &T, end: &EndPath, bias: Bias) -> Result<Boundary, String> {
    let element = end
        .path
        .resolve(tree)
        .ok_or_else(|| format!("path `{}` does not resolve", end.path))?;
    let len = tree.char_len(element);
    if end.text_offset > len {
        return Err(format!(
            "offset {} out of bounds for `{}` ({len} chars)",
            end.text_offset, end.path
        ));
    }
    tree.boundary_at(element, end.text_offset, bias)
        .ok_or_else(|| format!("no text under `{}`", end.path))
}
