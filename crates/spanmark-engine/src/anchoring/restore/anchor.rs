//! Layer 1: stable identifiers.

use crate::anchoring::model::EndAnchor;
use crate::tree::{Bias, Boundary, Span, TreeAdapter};

use super::{LayerOutcome, RestoreContext};

pub(super) fn attempt<T: TreeAdapter + ?Sized>(ctx: &RestoreContext<'_, T>) -> LayerOutcome {
    let anchors = &ctx.saved.restore.anchors;
    let (Some(start), Some(end)) = (&anchors.start, &anchors.end) else {
        return LayerOutcome::failed("no stable identifier recorded");
    };
    let start = match resolve(ctx.tree, start, Bias::Forward) {
        Ok(boundary) => boundary,
        Err(detail) => return LayerOutcome::failed(detail),
    };
    let end = match resolve(ctx.tree, end, Bias::Backward) {
        Ok(boundary) => boundary,
        Err(detail) => return LayerOutcome::failed(detail),
    };
    LayerOutcome::found(Span::new(start, end), "resolved by identifier")
}

fn resolve<T: TreeAdapter + ?Sized>(tree: &T, anchor: &EndAnchor, bias: Bias) -> Result<Boundary, String> {
    let element = tree
        .find_by_attribute(&anchor.attribute, &anchor.value)
        .ok_or_else(|| format!("{}=\"{}\" not found", anchor.attribute, anchor.value))?;
    let len = tree.char_len(element);
    if anchor.offset > len {
        return Err(format!(
            "offset {} out of bounds for {}=\"{}\" ({len} chars)",
            anchor.offset, anchor.attribute, anchor.value
        ));
    }
    tree.boundary_at(element, anchor.offset, bias)
        .ok_or_else(|| format!("no text under {}=\"{}\"", anchor.attribute, anchor.value))
}
