//! Post-layout overflow correction
//!
//! Estimated widths get block fragments close; real layout is the ground
//! truth. After the host lays the document out, a measurement pass walks
//! the spliced blocks and proportionally shrinks any that overflow their
//! container. Passes are tied to a generation counter: layout is async on
//! the host side, and a measurement that started before the latest splice
//! must not touch the newer tree.

use crate::core::splice::tree::{NodeId, NodeKind, OutputTree};

/// Host-side layout measurement boundary.
pub trait Measurer {
    /// Inner width of the preview column, in px.
    fn container_width(&self) -> f64;
    /// Laid-out width of one spliced block, in px. `None` when the block is
    /// not rendered (display:none ancestors measure as absent).
    fn block_width(&self, index: usize) -> Option<f64>;
}

/// Generation-counted shrink pass over spliced blocks.
#[derive(Debug, Default)]
pub struct PostLayout {
    generation: u64,
}

impl PostLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new generation, invalidating any in-flight measurement.
    /// Called on every splice; returns the generation token the eventual
    /// measurement pass must present.
    pub fn begin(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Shrink overflowing blocks in place. Returns the number of blocks
    /// adjusted, or `None` when `generation` is stale and the tree was left
    /// untouched.
    pub fn run(
        &self,
        generation: u64,
        tree: &mut OutputTree,
        measurer: &dyn Measurer,
        shrink_floor: f64,
    ) -> Option<usize> {
        if generation != self.generation {
            return None;
        }
        let container = measurer.container_width();
        if container <= 0.0 {
            return Some(0);
        }

        let blocks = spliced_block_ids(tree);
        let mut adjusted = 0usize;
        for (index, id) in blocks.into_iter().enumerate() {
            let Some(width) = measurer.block_width(index) else {
                continue;
            };
            if width <= container {
                continue;
            }
            // Slightly under full width so rounding never re-overflows
            let factor = (container / width * 0.98).max(shrink_floor);
            tree.set_attr(
                id,
                "style",
                &format!(
                    "transform:scale({:.3});transform-origin:left top;width:{:.1}%",
                    factor,
                    100.0 / factor
                ),
            );
            adjusted += 1;
        }
        Some(adjusted)
    }
}

/// Spliced block wrappers in document order, the order the host measures
/// them in.
pub fn spliced_block_ids(tree: &OutputTree) -> Vec<NodeId> {
    tree.walk()
        .into_iter()
        .filter(|&id| match &tree.node(id).kind {
            NodeKind::Element { tag, attrs } => {
                tag == "div"
                    && attrs
                        .iter()
                        .any(|(n, v)| n == "class" && v.contains("prelax-block"))
            }
            _ => false,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct FixedMeasurer {
        container: f64,
        widths: Vec<Option<f64>>,
    }

    impl Measurer for FixedMeasurer {
        fn container_width(&self) -> f64 {
            self.container
        }
        fn block_width(&self, index: usize) -> Option<f64> {
            self.widths.get(index).copied().flatten()
        }
    }

    fn tree_with_blocks(count: usize) -> OutputTree {
        let mut tree = OutputTree::new("div");
        for _ in 0..count {
            let block = tree.new_element("div");
            tree.set_attr(block, "class", "prelax-block");
            let root = tree.root();
            tree.append(root, block);
        }
        tree
    }

    #[test]
    fn test_overflowing_block_shrunk() {
        let mut layout = PostLayout::new();
        let generation = layout.begin();
        let mut tree = tree_with_blocks(1);
        let measurer = FixedMeasurer {
            container: 600.0,
            widths: vec![Some(800.0)],
        };
        let adjusted = layout.run(generation, &mut tree, &measurer, 0.55);
        assert_eq!(adjusted, Some(1));
        let html = tree.to_html();
        assert!(html.contains("scale(0.735)"));
        assert!(html.contains("width:136.1%"));
    }

    #[test]
    fn test_fitting_block_untouched() {
        let mut layout = PostLayout::new();
        let generation = layout.begin();
        let mut tree = tree_with_blocks(1);
        let measurer = FixedMeasurer {
            container: 600.0,
            widths: vec![Some(500.0)],
        };
        assert_eq!(layout.run(generation, &mut tree, &measurer, 0.55), Some(0));
        assert!(!tree.to_html().contains("scale("));
    }

    #[test]
    fn test_shrink_floor_applies() {
        let mut layout = PostLayout::new();
        let generation = layout.begin();
        let mut tree = tree_with_blocks(1);
        let measurer = FixedMeasurer {
            container: 100.0,
            widths: vec![Some(1000.0)],
        };
        layout.run(generation, &mut tree, &measurer, 0.55);
        assert!(tree.to_html().contains("scale(0.550)"));
    }

    #[test]
    fn test_stale_generation_is_a_no_op() {
        let mut layout = PostLayout::new();
        let stale = layout.begin();
        let _current = layout.begin();
        let mut tree = tree_with_blocks(1);
        let measurer = FixedMeasurer {
            container: 600.0,
            widths: vec![Some(800.0)],
        };
        assert_eq!(layout.run(stale, &mut tree, &measurer, 0.55), None);
        assert!(!tree.to_html().contains("scale("));
    }

    #[test]
    fn test_unmeasured_block_skipped() {
        let mut layout = PostLayout::new();
        let generation = layout.begin();
        let mut tree = tree_with_blocks(2);
        let measurer = FixedMeasurer {
            container: 600.0,
            widths: vec![None, Some(700.0)],
        };
        assert_eq!(layout.run(generation, &mut tree, &measurer, 0.55), Some(1));
    }
}
