//! Human-readable rendering of masked / generated / ground-truth sequences

use burn::prelude::*;

use crate::vocab::Vocab;

/// Turns a batch of token ids into one text line per example.
pub struct SequenceRenderer<'a> {
    vocab: &'a Vocab,
}

impl<'a> SequenceRenderer<'a> {
    pub fn new(vocab: &'a Vocab) -> Self {
        Self { vocab }
    }

    pub fn render<B: Backend>(&self, tokens: Tensor<B, 2, Int>) -> Vec<String> {
        let [_, seq_len] = tokens.dims();
        let ids: Vec<i64> = tokens.into_data().iter::<i64>().collect();
        if seq_len == 0 {
            return Vec::new();
        }
        ids.chunks(seq_len)
            .map(|example| self.vocab.string(example))
            .collect()
    }
}

/// Interleave `> masked`, `< generated`, `= truth` and a blank separator for
/// the first `truncate` examples (all of them when `None`).
pub fn pretty_lines<B: Backend>(
    renderer: &SequenceRenderer<'_>,
    masked: Tensor<B, 2, Int>,
    unmasked: Tensor<B, 2, Int>,
    generated: Tensor<B, 2, Int>,
    truncate: Option<usize>,
) -> Vec<String> {
    let masked = renderer.render(masked);
    let unmasked = renderer.render(unmasked);
    let generated = renderer.render(generated);
    let limit = truncate.unwrap_or(masked.len());

    let mut lines = Vec::new();
    for ((masked, unmasked), generated) in masked
        .iter()
        .zip(&unmasked)
        .zip(&generated)
        .take(limit.max(1))
    {
        lines.push(format!("> {}", masked));
        lines.push(format!("< {}", generated));
        lines.push(format!("= {}", unmasked));
        lines.push(String::new());
    }
    lines
}

/// [`pretty_lines`] joined with `<br>` for HTML log sinks.
pub fn pretty_print<B: Backend>(
    renderer: &SequenceRenderer<'_>,
    masked: Tensor<B, 2, Int>,
    unmasked: Tensor<B, 2, Int>,
    generated: Tensor<B, 2, Int>,
    truncate: Option<usize>,
) -> String {
    pretty_lines(renderer, masked, unmasked, generated, truncate).join("<br>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray;

    fn ids(values: Vec<i64>, rows: usize, device: &<B as Backend>::Device) -> Tensor<B, 2, Int> {
        let cols = values.len() / rows;
        Tensor::from_data(TensorData::new(values, [rows, cols]), device)
    }

    #[test]
    fn test_render_one_line_per_example() {
        let vocab = Vocab::from_symbols(["the", "cat"]);
        let device = Default::default();
        let the = vocab.index("the") as i64;
        let cat = vocab.index("cat") as i64;
        let renderer = SequenceRenderer::new(&vocab);
        let lines = renderer.render(ids(vec![the, cat, cat, 0], 2, &device));
        assert_eq!(lines, vec!["the cat".to_string(), "cat".to_string()]);
    }

    #[test]
    fn test_truncation_limits_groups() {
        let vocab = Vocab::from_symbols(["a", "b"]);
        let device = Default::default();
        let a = vocab.index("a") as i64;
        let m = vocab.mask() as i64;
        let renderer = SequenceRenderer::new(&vocab);

        let lines = pretty_lines(
            &renderer,
            ids(vec![m, a, m, a, m, a], 3, &device),
            ids(vec![a, a, a, a, a, a], 3, &device),
            ids(vec![a, a, a, a, a, a], 3, &device),
            Some(2),
        );
        assert_eq!(lines.len(), 2 * 4);
        assert_eq!(lines[0], "> <mask> a");
        assert_eq!(lines[1], "< a a");
        assert_eq!(lines[2], "= a a");
        assert_eq!(lines[3], "");
    }

    #[test]
    fn test_no_truncation_renders_everything() {
        let vocab = Vocab::from_symbols(["a"]);
        let device = Default::default();
        let renderer = SequenceRenderer::new(&vocab);
        let tokens = ids(vec![5, 5, 5], 3, &device);
        let joined = pretty_print(&renderer, tokens.clone(), tokens.clone(), tokens, None);
        assert_eq!(joined.matches("> ").count(), 3);
        assert_eq!(joined.split("<br>").count(), 12);
    }
}
