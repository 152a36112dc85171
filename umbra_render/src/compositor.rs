// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Executes render lists against a [`Context`].
//!
//! For every element drawn, the compositor pushes its render state, asks the
//! [`ElementRenderer`] to paint the element's own content, and later pops the
//! state again, compositing any offscreen groups on the way out:
//!
//! ```text
//!   push  absolute transform
//!   push  opacity group        (opacity < 1 or opacity mask)
//!   push  projection plane     (projection)       + absolute transform again
//!   push  effect / cache group (effect, or bitmap cache without projection)
//!   push  clip
//!         renderer.render(..)
//!   pop   ... in reverse: effect / project / blend, then mask or opacity
//! ```

use hashbrown::HashMap;
use kurbo::{Insets, Point, Rect};
use umbra_core::color::Color;
use umbra_core::cull::{CullConfig, RenderList, RenderOp};
use umbra_core::element::{
    CacheMode, Effect, ElementId, ElementTree, MaskId, is_invisible_opacity,
};
use umbra_core::region::{Region, round_out};
use umbra_core::trace::{DiagnosticEvent, DiagnosticKind, Tracer};
use umbra_core::transform::Transform3d;

use crate::backend::RenderBackend;
use crate::context::{Context, GroupOutcome};

/// Compositor settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompositorConfig {
    /// Render-list builder settings.
    pub cull: CullConfig,
    /// Colour the damaged area is cleared to before painting, if any.
    pub background: Option<Color>,
}

impl CompositorConfig {
    /// Default culling, no background clear.
    pub const DEFAULT: Self = Self {
        cull: CullConfig::DEFAULT,
        background: None,
    };
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Paints element content.
///
/// The context's transform maps the element's local coordinates when
/// [`render`](Self::render) is called, and its clip already includes the
/// element's clip.
pub trait ElementRenderer<B: RenderBackend> {
    /// Paints the element's own content, not its children.
    ///
    /// `region` is the area of the surface this element must repaint.
    fn render(
        &mut self,
        tree: &ElementTree,
        id: ElementId,
        region: &Region,
        ctx: &mut Context<'_, B>,
    );

    /// Paints `mask` into a new surface covering `placement`, whose alpha
    /// scales the element's group when it is composited.
    ///
    /// Returning `None` composites the group with plain opacity.
    fn render_opacity_mask(
        &mut self,
        tree: &ElementTree,
        id: ElementId,
        mask: MaskId,
        placement: Rect,
        ctx: &mut Context<'_, B>,
    ) -> Option<B::Surface> {
        _ = (tree, id, mask, placement, ctx);
        None
    }
}

/// An [`ElementRenderer`] that fills each element's extents with a solid
/// colour.
#[derive(Clone, Debug, Default)]
pub struct SolidFills {
    fills: HashMap<ElementId, Color>,
    masks: HashMap<MaskId, Color>,
}

impl SolidFills {
    /// Creates a renderer that paints nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the colour an element is filled with.
    pub fn set_fill(&mut self, id: ElementId, color: Color) {
        self.fills.insert(id, color);
    }

    /// Stops filling an element.
    pub fn remove_fill(&mut self, id: ElementId) {
        self.fills.remove(&id);
    }

    /// Sets the uniform colour an opacity mask paints.
    pub fn set_mask(&mut self, mask: MaskId, color: Color) {
        self.masks.insert(mask, color);
    }
}

impl<B: RenderBackend> ElementRenderer<B> for SolidFills {
    fn render(
        &mut self,
        tree: &ElementTree,
        id: ElementId,
        region: &Region,
        ctx: &mut Context<'_, B>,
    ) {
        _ = region;
        if let Some(&color) = self.fills.get(&id) {
            ctx.fill_rect(Rect::from_origin_size(Point::ORIGIN, tree.size(id)), color);
        }
    }

    fn render_opacity_mask(
        &mut self,
        tree: &ElementTree,
        id: ElementId,
        mask: MaskId,
        placement: Rect,
        ctx: &mut Context<'_, B>,
    ) -> Option<B::Surface> {
        _ = (tree, id);
        let color = *self.masks.get(&mask)?;
        let (w, h) = (placement.width(), placement.height());
        #[expect(
            clippy::cast_possible_truncation,
            reason = "placements are whole pixels of an allocated group"
        )]
        let mut surface = ctx.create_surface(w as u32, h as u32).ok()?;
        ctx.backend()
            .clear(&mut surface, Rect::new(0.0, 0.0, w, h), color);
        Some(surface)
    }
}

/// One frame pushed by pre-render; post-render undoes them in reverse.
#[derive(Clone, Copy, Debug)]
enum Layer {
    /// Transform or clip.
    State,
    Opacity,
    /// Projection plane, composited through the matrix.
    Plane(Transform3d),
    Effect,
    Cache,
}

/// Turns damage into render lists and executes them.
#[derive(Debug, Default)]
pub struct Compositor {
    config: CompositorConfig,
    list: RenderList,
}

impl Compositor {
    /// Creates a compositor.
    #[must_use]
    pub fn new(config: CompositorConfig) -> Self {
        Self {
            config,
            list: RenderList::new(),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> CompositorConfig {
        self.config
    }

    /// Replaces the configuration.
    pub fn set_config(&mut self, config: CompositorConfig) {
        self.config = config;
    }

    /// The render list of the last [`paint`](Self::paint).
    #[must_use]
    pub fn render_list(&self) -> &RenderList {
        &self.list
    }

    /// Repaints `damage`.
    ///
    /// `extra_transform` maps the tree's root space onto the context, for
    /// hosts that scale or offset the whole surface. The damage is painted
    /// as its bounding rectangle, and the result matches a full repaint
    /// inside it: effect and cache groups capture their whole element, not
    /// just the damaged part. The context is returned to its depth on
    /// entry.
    pub fn paint<B, R>(
        &mut self,
        tree: &ElementTree,
        ctx: &mut Context<'_, B>,
        renderer: &mut R,
        damage: &Region,
        extra_transform: Option<Transform3d>,
        tracer: &mut Tracer<'_>,
    ) where
        B: RenderBackend,
        R: ElementRenderer<B> + ?Sized,
    {
        self.list.clear();
        if damage.is_empty() {
            return;
        }
        let depth = ctx.depth();
        let bounds = damage.bounds();

        ctx.push_root_transform(extra_transform.unwrap_or(Transform3d::IDENTITY));
        let damage_clip = ctx.transform().transform_rect_bbox(bounds);
        ctx.push_damage_clip(damage_clip);
        if let Some(background) = self.config.background {
            ctx.clear(background);
        }

        tree.build_render_list(&Region::from_rect(bounds), &self.config.cull, &mut self.list);
        tracer.render_list(&self.list.event(tree.frame_index()));
        log::trace!(
            "painting {} nodes for {} damage rects",
            self.list.len(),
            damage.len()
        );

        let mut painter = Painter {
            tree,
            renderer,
            tracer,
            open: Vec::new(),
        };
        for node in self.list.iter() {
            match node.op {
                RenderOp::Enter => {
                    let layers = painter.pre_render(ctx, node.element);
                    painter.render(ctx, node.element, &node.region);
                    painter.open.push(layers);
                }
                RenderOp::Leave => {
                    if let Some(layers) = painter.open.pop() {
                        painter.post_render(ctx, node.element, layers);
                    }
                }
                RenderOp::Paint => {
                    let layers = painter.pre_render(ctx, node.element);
                    painter.render(ctx, node.element, &node.region);
                    painter.post_render(ctx, node.element, layers);
                }
                RenderOp::PaintSubtree => {
                    painter.paint_subtree(ctx, node.element, &node.region);
                }
            }
        }

        while ctx.depth() > depth {
            ctx.pop();
        }
    }
}

struct Painter<'p, 't, R: ?Sized> {
    tree: &'p ElementTree,
    renderer: &'p mut R,
    tracer: &'p mut Tracer<'t>,
    open: Vec<Vec<Layer>>,
}

impl<R: ?Sized> Painter<'_, '_, R> {
    fn render<B>(&mut self, ctx: &mut Context<'_, B>, id: ElementId, region: &Region)
    where
        B: RenderBackend,
        R: ElementRenderer<B>,
    {
        self.renderer.render(self.tree, id, region, ctx);
    }

    /// Draws an element and every visible descendant, back to front.
    fn paint_subtree<B>(&mut self, ctx: &mut Context<'_, B>, id: ElementId, region: &Region)
    where
        B: RenderBackend,
        R: ElementRenderer<B>,
    {
        let layers = self.pre_render(ctx, id);
        let tree = self.tree;
        let whole;
        let region = if layers
            .iter()
            .any(|l| matches!(l, Layer::Effect | Layer::Cache | Layer::Plane(_)))
        {
            whole = Region::from_rect(round_out(tree.subtree_bounds(id)));
            &whole
        } else {
            region
        };
        self.render(ctx, id, region);
        for child in tree.paint_order(id) {
            if tree.is_render_visible(child) && !is_invisible_opacity(tree.opacity(child)) {
                self.paint_subtree(ctx, child, region);
            }
        }
        self.post_render(ctx, id, layers);
    }

    fn pre_render<B: RenderBackend>(
        &mut self,
        ctx: &mut Context<'_, B>,
        id: ElementId,
    ) -> Vec<Layer> {
        let tree = self.tree;
        let abs = tree.absolute_transform(id);
        let mut layers = vec![Layer::State];
        ctx.push_absolute_transform(abs);

        if tree.opacity(id) < 1.0 || tree.opacity_mask(id).is_some() {
            let bounds = ctx.base().transform_rect_bbox(tree.subtree_bounds(id));
            let outcome = ctx.push_group(bounds);
            self.check(outcome, id);
            layers.push(Layer::Opacity);
        }

        let padding = tree.effect(id).map_or(Insets::ZERO, Effect::padding);
        let inner = tree.inner_bounds(id) + padding;
        let projection = tree.projection(id);
        if let Some(projection) = projection {
            let matrix = ctx.base() * projection;
            let outcome = ctx.push_plane_group(inner);
            self.check(outcome, id);
            layers.push(Layer::Plane(matrix));
            ctx.push_absolute_transform(abs);
            layers.push(Layer::State);
        }

        let cached = projection.is_none() && tree.cache_mode(id) == CacheMode::BitmapCache;
        if tree.effect(id).is_some() || cached {
            let bounds = ctx.base().transform_rect_bbox(inner);
            let outcome = ctx.push_effect_group(bounds);
            self.check(outcome, id);
            layers.push(if cached && tree.effect(id).is_none() {
                Layer::Cache
            } else {
                Layer::Effect
            });
        }

        if let Some(clip) = tree.clip(id) {
            ctx.push_clip(clip.bounding_box());
            layers.push(Layer::State);
        }
        layers
    }

    fn post_render<B>(&mut self, ctx: &mut Context<'_, B>, id: ElementId, layers: Vec<Layer>)
    where
        B: RenderBackend,
        R: ElementRenderer<B>,
    {
        let tree = self.tree;
        for layer in layers.into_iter().rev() {
            let Some((surface, placement)) = ctx.pop() else {
                continue;
            };
            let at = placement.origin();
            match layer {
                Layer::State => {}
                Layer::Opacity => {
                    let opacity = tree.opacity(id);
                    let mask = tree.opacity_mask(id).and_then(|mask| {
                        self.renderer
                            .render_opacity_mask(tree, id, mask, placement, ctx)
                    });
                    match mask {
                        Some(mask) => ctx.blend_masked(&surface, &mask, opacity, at),
                        None => ctx.blend(&surface, opacity, at),
                    }
                }
                Layer::Plane(matrix) => ctx.project(&surface, &matrix, 1.0, at),
                Layer::Cache => ctx.blend(&surface, 1.0, at),
                Layer::Effect => match tree.effect(id) {
                    Some(Effect::Blur { radius }) => ctx.blur(&surface, *radius, at),
                    Some(Effect::DropShadow {
                        offset,
                        blur_radius,
                        color,
                    }) => ctx.drop_shadow(&surface, *offset, *blur_radius, *color, at),
                    Some(Effect::Shader(shader)) => {
                        if !ctx.supports_shader(shader) {
                            self.diagnostic(DiagnosticKind::EffectFallback, id);
                        }
                        ctx.shader_effect(&surface, shader, at);
                    }
                    None => ctx.blend(&surface, 1.0, at),
                },
            }
        }
    }

    fn check(&mut self, outcome: GroupOutcome, id: ElementId) {
        if let GroupOutcome::Failed(_) = outcome {
            self.diagnostic(DiagnosticKind::GroupAllocationFailed, id);
        }
    }

    fn diagnostic(&mut self, kind: DiagnosticKind, id: ElementId) {
        self.tracer.diagnostic(&DiagnosticEvent {
            frame_index: self.tree.frame_index(),
            kind,
            element_index: id.index(),
        });
    }
}

#[cfg(test)]
mod tests {
    use kurbo::{Size, Vec2};
    use umbra_core::element::{ClipShape, ElementKind, ShaderEffect};

    use super::*;
    use crate::image::Image;
    use crate::shader::asm;
    use crate::software::{SoftwareBackend, SoftwareConfig};

    const RED: [u8; 4] = [0, 0, 255, 255];
    const BLUE: [u8; 4] = [255, 0, 0, 255];
    const CLEAR: [u8; 4] = [0, 0, 0, 0];

    struct Scene {
        tree: ElementTree,
        root: ElementId,
        fills: SolidFills,
    }

    impl Scene {
        fn new() -> Self {
            let mut tree = ElementTree::new();
            let root = tree.create_element(ElementKind::Container);
            tree.set_size(root, Size::new(100.0, 100.0));
            tree.set_root(root);
            Self {
                tree,
                root,
                fills: SolidFills::new(),
            }
        }

        fn add(
            &mut self,
            parent: ElementId,
            kind: ElementKind,
            rect: Rect,
            fill: Option<Color>,
        ) -> ElementId {
            let id = self.tree.create_element(kind);
            self.tree.set_offset(id, Vec2::new(rect.x0, rect.y0));
            self.tree.set_size(id, rect.size());
            self.tree.add_child(parent, id);
            if let Some(color) = fill {
                self.fills.set_fill(id, color);
                self.tree.set_opaque(id, color.is_opaque());
            }
            id
        }

        fn leaf(&mut self, rect: Rect, color: Color) -> ElementId {
            let root = self.root;
            self.add(root, ElementKind::Leaf, rect, Some(color))
        }

        fn paint_with(
            &mut self,
            backend: &mut SoftwareBackend,
            config: CompositorConfig,
            extra: Option<Transform3d>,
        ) -> Image {
            let full = Rect::new(0.0, 0.0, 100.0, 100.0);
            self.paint_damage(backend, config, extra, full)
        }

        fn paint_damage(
            &mut self,
            backend: &mut SoftwareBackend,
            config: CompositorConfig,
            extra: Option<Transform3d>,
            damage: Rect,
        ) -> Image {
            self.tree.process_dirty_elements();
            let mut image = Image::new(100, 100).unwrap();
            let mut ctx = Context::new(backend, &mut image);
            let mut compositor = Compositor::new(config);
            compositor.paint(
                &self.tree,
                &mut ctx,
                &mut self.fills,
                &Region::from_rect(damage),
                extra,
                &mut Tracer::none(),
            );
            assert_eq!(ctx.depth(), 0, "paint restores the context");
            drop(ctx);
            image
        }

        fn paint(&mut self) -> Image {
            self.paint_with(&mut SoftwareBackend::default(), CompositorConfig::DEFAULT, None)
        }

        /// Asserts that repainting only `damage` gives the pixels a full
        /// repaint gives there.
        fn assert_partial_matches_full(&mut self, damage: Rect) {
            let full = self.paint();
            let partial = self.paint_damage(
                &mut SoftwareBackend::default(),
                CompositorConfig::DEFAULT,
                None,
                damage,
            );
            #[expect(
                clippy::cast_possible_truncation,
                reason = "test damage rects are whole pixels inside the image"
            )]
            let (x0, y0, x1, y1) = (
                damage.x0 as u32,
                damage.y0 as u32,
                damage.x1 as u32,
                damage.y1 as u32,
            );
            for y in y0..y1 {
                for x in x0..x1 {
                    assert_eq!(
                        partial.pixel(x, y),
                        full.pixel(x, y),
                        "pixel ({x}, {y}) differs from a full repaint"
                    );
                }
            }
        }
    }

    #[test]
    fn red_under_blue() {
        let mut s = Scene::new();
        s.leaf(Rect::new(0.0, 0.0, 60.0, 60.0), Color::RED);
        s.leaf(Rect::new(40.0, 40.0, 100.0, 100.0), Color::BLUE);
        let config = CompositorConfig {
            cull: CullConfig::front_to_back(),
            background: Some(Color::WHITE),
        };
        let img = s.paint_with(&mut SoftwareBackend::default(), config, None);
        assert_eq!(img.pixel(10, 10), RED);
        assert_eq!(img.pixel(50, 50), BLUE, "blue on top");
        assert_eq!(img.pixel(90, 10), [255, 255, 255, 255], "background");
    }

    struct Counting {
        inner: SolidFills,
        calls: Vec<ElementId>,
    }

    impl<B: RenderBackend> ElementRenderer<B> for Counting {
        fn render(
            &mut self,
            tree: &ElementTree,
            id: ElementId,
            region: &Region,
            ctx: &mut Context<'_, B>,
        ) {
            self.calls.push(id);
            ElementRenderer::<B>::render(&mut self.inner, tree, id, region, ctx);
        }
    }

    #[test]
    fn renders_each_visited_node_once() {
        let mut s = Scene::new();
        let hidden = s.leaf(Rect::new(10.0, 10.0, 20.0, 20.0), Color::RED);
        let front = s.leaf(Rect::new(0.0, 0.0, 50.0, 50.0), Color::BLUE);
        let group = s.add(
            s.root,
            ElementKind::Container,
            Rect::new(50.0, 50.0, 90.0, 90.0),
            None,
        );
        s.tree.set_effect(group, Some(Effect::Blur { radius: 2.0 }));
        let inside = s.add(
            group,
            ElementKind::Leaf,
            Rect::new(0.0, 0.0, 10.0, 10.0),
            Some(Color::RED),
        );
        s.tree.process_dirty_elements();

        let mut image = Image::new(100, 100).unwrap();
        let mut backend = SoftwareBackend::default();
        let mut ctx = Context::new(&mut backend, &mut image);
        let mut renderer = Counting {
            inner: s.fills.clone(),
            calls: Vec::new(),
        };
        let mut compositor = Compositor::new(CompositorConfig {
            cull: CullConfig::front_to_back(),
            background: None,
        });
        compositor.paint(
            &s.tree,
            &mut ctx,
            &mut renderer,
            &Region::from_rect(Rect::new(0.0, 0.0, 100.0, 100.0)),
            None,
            &mut Tracer::none(),
        );
        assert_eq!(renderer.calls, [s.root, front, group, inside]);
        assert!(!renderer.calls.contains(&hidden), "occluded leaf skipped");
    }

    #[test]
    fn opacity_groups_composite_once() {
        let mut s = Scene::new();
        let group = s.add(
            s.root,
            ElementKind::Container,
            Rect::new(0.0, 0.0, 50.0, 50.0),
            None,
        );
        s.tree.set_opacity(group, 0.5);
        let red = Some(Color::RED);
        s.add(group, ElementKind::Leaf, Rect::new(0.0, 0.0, 30.0, 30.0), red);
        let blue = Some(Color::BLUE);
        s.add(group, ElementKind::Leaf, Rect::new(10.0, 10.0, 40.0, 40.0), blue);
        let img = s.paint();
        assert_eq!(img.pixel(20, 20), [128, 0, 0, 128], "no red shows through");
        assert_eq!(img.pixel(5, 5), [0, 0, 128, 128]);
        assert_eq!(img.pixel(45, 45), CLEAR);
    }

    #[test]
    fn failed_group_draws_ungrouped() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut s = Scene::new();
        let group = s.add(
            s.root,
            ElementKind::Container,
            Rect::new(0.0, 0.0, 50.0, 50.0),
            None,
        );
        s.tree.set_opacity(group, 0.5);
        let red = Some(Color::RED);
        s.add(group, ElementKind::Leaf, Rect::new(0.0, 0.0, 30.0, 30.0), red);
        let mut backend = SoftwareBackend::new(SoftwareConfig {
            max_surface_size: 16,
        });
        let img = s.paint_with(&mut backend, CompositorConfig::DEFAULT, None);
        assert_eq!(img.pixel(5, 5), RED, "opacity lost, content kept");
    }

    #[test]
    fn opacity_mask_scales_alpha() {
        let mut s = Scene::new();
        let id = s.leaf(Rect::new(0.0, 0.0, 20.0, 20.0), Color::RED);
        s.tree.set_opacity_mask(id, Some(MaskId(7)));
        s.fills.set_mask(MaskId(7), Color::new(0.0, 0.0, 0.0, 0.5));
        let img = s.paint();
        assert_eq!(img.pixel(10, 10), [0, 0, 128, 128]);
    }

    #[test]
    fn clip_limits_content() {
        let mut s = Scene::new();
        let id = s.leaf(Rect::new(10.0, 10.0, 50.0, 50.0), Color::RED);
        s.tree.set_clip(id, Some(ClipShape::Rect(Rect::new(0.0, 0.0, 10.0, 10.0))));
        let img = s.paint();
        assert_eq!(img.pixel(15, 15), RED);
        assert_eq!(img.pixel(25, 25), CLEAR);
    }

    #[test]
    fn blur_effect_spreads_content() {
        let mut s = Scene::new();
        let id = s.leaf(Rect::new(40.0, 40.0, 50.0, 50.0), Color::WHITE);
        s.tree.set_effect(id, Some(Effect::Blur { radius: 4.0 }));
        let img = s.paint();
        let total = img.total_alpha();
        assert!((total - 100.0).abs() < 3.0, "coverage {total}");
        assert!(img.pixel(38, 45)[3] > 0, "spread past the extents");
        assert!(img.pixel(40, 45)[3] < 255, "edge softened");
    }

    #[test]
    fn drop_shadow_under_content() {
        let mut s = Scene::new();
        let id = s.leaf(Rect::new(10.0, 10.0, 30.0, 30.0), Color::RED);
        s.tree.set_effect(
            id,
            Some(Effect::DropShadow {
                offset: Vec2::new(5.0, 5.0),
                blur_radius: 0.0,
                color: Color::BLACK,
            }),
        );
        let img = s.paint();
        assert_eq!(img.pixel(20, 20), RED);
        assert_eq!(img.pixel(32, 32), [0, 0, 0, 255], "shadow");
        assert_eq!(img.pixel(36, 36), CLEAR);
    }

    #[test]
    fn partial_repaint_keeps_shadow_cast_from_outside_the_damage() {
        let mut s = Scene::new();
        let id = s.leaf(Rect::new(10.0, 10.0, 30.0, 30.0), Color::RED);
        s.tree.set_effect(
            id,
            Some(Effect::DropShadow {
                offset: Vec2::new(10.0, 10.0),
                blur_radius: 0.0,
                color: Color::BLACK,
            }),
        );
        s.assert_partial_matches_full(Rect::new(32.0, 32.0, 40.0, 40.0));

        let partial = s.paint_damage(
            &mut SoftwareBackend::default(),
            CompositorConfig::DEFAULT,
            None,
            Rect::new(32.0, 32.0, 40.0, 40.0),
        );
        assert_eq!(partial.pixel(35, 35), [0, 0, 0, 255], "shadow repainted");
        assert_eq!(partial.pixel(20, 20), CLEAR, "nothing outside the damage");
    }

    #[test]
    fn partial_repaint_matches_full_across_a_blur_edge() {
        let mut s = Scene::new();
        let id = s.leaf(Rect::new(20.0, 20.0, 60.0, 60.0), Color::BLUE);
        s.tree.set_effect(id, Some(Effect::Blur { radius: 6.0 }));
        s.assert_partial_matches_full(Rect::new(55.0, 30.0, 70.0, 45.0));
        s.assert_partial_matches_full(Rect::new(10.0, 10.0, 24.0, 24.0));
    }

    #[test]
    fn partial_repaint_matches_full_for_cached_and_nested_effects() {
        let mut s = Scene::new();
        let root = s.root;
        let group = s.add(root, ElementKind::Container, Rect::new(10.0, 10.0, 70.0, 70.0), None);
        s.tree.set_opacity(group, 0.5);
        s.tree.set_cache_mode(group, CacheMode::BitmapCache);
        let child = s.add(
            group,
            ElementKind::Leaf,
            Rect::new(5.0, 5.0, 40.0, 40.0),
            Some(Color::GREEN),
        );
        s.tree.set_effect(
            child,
            Some(Effect::DropShadow {
                offset: Vec2::new(8.0, 8.0),
                blur_radius: 3.0,
                color: Color::BLACK,
            }),
        );
        s.assert_partial_matches_full(Rect::new(48.0, 48.0, 60.0, 60.0));
    }

    #[test]
    fn projection_maps_the_flattened_subtree() {
        let mut s = Scene::new();
        let id = s.leaf(Rect::new(0.0, 0.0, 10.0, 10.0), Color::RED);
        s.tree.set_projection(id, Some(Transform3d::from_translation(20.0, 30.0, 0.0)));
        let img = s.paint();
        assert_eq!(img.pixel(25, 35), RED);
        assert_eq!(img.pixel(5, 5), CLEAR, "only the projected copy");
    }

    #[test]
    fn bitmap_cache_matches_direct() {
        let mut direct = Scene::new();
        direct.leaf(Rect::new(5.0, 5.0, 25.0, 15.0), Color::GREEN);
        let mut cached = Scene::new();
        let id = cached.leaf(Rect::new(5.0, 5.0, 25.0, 15.0), Color::GREEN);
        cached.tree.set_cache_mode(id, CacheMode::BitmapCache);
        assert_eq!(direct.paint(), cached.paint());
    }

    #[test]
    fn passthrough_shader_matches_direct() {
        let mut direct = Scene::new();
        direct.leaf(Rect::new(5.0, 5.0, 25.0, 15.0), Color::BLUE);
        let mut shaded = Scene::new();
        let id = shaded.leaf(Rect::new(5.0, 5.0, 25.0, 15.0), Color::BLUE);
        shaded
            .tree
            .set_effect(id, Some(Effect::Shader(ShaderEffect::new(asm::passthrough()))));
        assert_eq!(direct.paint(), shaded.paint());
    }

    #[test]
    fn extra_transform_offsets_everything() {
        let mut s = Scene::new();
        s.leaf(Rect::new(0.0, 0.0, 10.0, 10.0), Color::RED);
        let extra = Transform3d::from_translation(50.0, 50.0, 0.0);
        let img = s.paint_with(
            &mut SoftwareBackend::default(),
            CompositorConfig::DEFAULT,
            Some(extra),
        );
        assert_eq!(img.pixel(55, 55), RED);
        assert_eq!(img.pixel(5, 5), CLEAR);
    }

    #[test]
    fn damage_limits_painting() {
        let mut s = Scene::new();
        s.leaf(Rect::new(0.0, 0.0, 100.0, 100.0), Color::RED);
        s.tree.process_dirty_elements();
        let mut image = Image::new(100, 100).unwrap();
        let mut backend = SoftwareBackend::default();
        let mut ctx = Context::new(&mut backend, &mut image);
        Compositor::new(CompositorConfig::DEFAULT).paint(
            &s.tree,
            &mut ctx,
            &mut s.fills,
            &Region::from_rect(Rect::new(10.0, 10.0, 20.0, 20.0)),
            None,
            &mut Tracer::none(),
        );
        drop(ctx);
        assert_eq!(image.pixel(15, 15), RED);
        assert_eq!(image.pixel(25, 25), CLEAR);
        assert_eq!(image.total_alpha(), 100.0);
    }

    #[cfg(feature = "trace")]
    #[test]
    fn unsupported_shader_reports_fallback() {
        use umbra_core::trace::{DiagnosticEvent, TraceSink};

        #[derive(Default)]
        struct Diagnostics(Vec<DiagnosticKind>);
        impl TraceSink for Diagnostics {
            fn on_diagnostic(&mut self, e: &DiagnosticEvent) {
                self.0.push(e.kind);
            }
        }

        let mut s = Scene::new();
        let id = s.leaf(Rect::new(0.0, 0.0, 10.0, 10.0), Color::RED);
        let unsupported = ShaderEffect::new(vec![0xFFFF_0300, 0x0000_FFFF]);
        s.tree.set_effect(id, Some(Effect::Shader(unsupported)));
        s.tree.process_dirty_elements();

        let mut sink = Diagnostics::default();
        let mut image = Image::new(100, 100).unwrap();
        let mut backend = SoftwareBackend::default();
        let mut ctx = Context::new(&mut backend, &mut image);
        Compositor::default().paint(
            &s.tree,
            &mut ctx,
            &mut s.fills,
            &Region::from_rect(Rect::new(0.0, 0.0, 100.0, 100.0)),
            None,
            &mut Tracer::new(&mut sink),
        );
        drop(ctx);
        assert_eq!(sink.0, [DiagnosticKind::EffectFallback]);
        assert_eq!(image.pixel(5, 5), RED, "input composited unchanged");
    }
}
