//! The style-inheritance cascade: slide -> layout -> master -> theme.
//!
//! Resolution walks placeholder pairings up the chain, merging unset fields
//! at each rung. A child's explicit field always wins; recursion terminates
//! at the master, whose per-category default text styles and the theme font
//! scheme fill whatever is left. Resolution never errors: an exhausted chain
//! yields the empty default and the caller decides whether that matters.

use crate::pptx::shapes::shape::Shape;
use crate::pptx::shapes::tree::ShapeTree;
use crate::pptx::style::fontdata::{FontData, parse_level_styles};
use crate::pptx::theme::Theme;
use crate::pptx::xmlutil;
use std::collections::HashMap;

/// The master's default text styles, one level map per placeholder category.
#[derive(Debug, Clone, Default)]
pub struct MasterTextStyles {
    /// `<p:titleStyle>` levels, for title and centered-title placeholders
    pub title: HashMap<u8, FontData>,
    /// `<p:bodyStyle>` levels, for all other placeholders
    pub body: HashMap<u8, FontData>,
    /// `<p:otherStyle>` levels, for shapes outside any placeholder
    pub other: HashMap<u8, FontData>,
}

impl MasterTextStyles {
    /// Parse the `<p:txStyles>` element of a slide master.
    pub fn parse(master_xml: &[u8]) -> MasterTextStyles {
        let style_of = |qname: &[u8]| -> HashMap<u8, FontData> {
            match xmlutil::element_span(master_xml, qname) {
                Some(span) => parse_level_styles(&master_xml[span.start..span.end]),
                None => HashMap::new(),
            }
        };
        MasterTextStyles {
            title: style_of(b"p:titleStyle"),
            body: style_of(b"p:bodyStyle"),
            other: style_of(b"p:otherStyle"),
        }
    }

    /// The level map for a shape's placeholder category.
    fn category_for(&self, shape: &Shape) -> &HashMap<u8, FontData> {
        match shape.placeholder() {
            Some(key) if key.kind == "title" || key.kind == "ctrTitle" => &self.title,
            Some(_) => &self.body,
            None => &self.other,
        }
    }
}

/// Everything the resolver needs from the chain above one slide.
pub struct CascadeContext<'a> {
    /// The layout's shape tree, when the slide has one
    pub layout_tree: Option<&'a ShapeTree>,
    /// The master's shape tree
    pub master_tree: Option<&'a ShapeTree>,
    /// The master's default text styles
    pub master_styles: &'a MasterTextStyles,
    /// The master's theme
    pub theme: &'a Theme,
}

/// Resolve a shape's effective font at an outline level.
///
/// Follows the placeholder pairing one level up per hop; a shape with no
/// paragraphs and no list style simply starts empty and inherits everything.
pub fn resolve_font(ctx: &CascadeContext<'_>, shape: &Shape, level: u8) -> FontData {
    let mut data = own_level_font(shape, level);

    if !data.is_filled()
        && let Some(key) = shape.placeholder()
    {
        // Layout hop.
        let layout_shape = ctx.layout_tree.and_then(|t| t.find_placeholder(key));
        if let Some(layout_shape) = layout_shape {
            data.merge_from(&own_level_font(layout_shape, level));
        }

        // Master hop.
        if !data.is_filled() {
            let master_shape = ctx.master_tree.and_then(|t| t.find_placeholder(key));
            if let Some(master_shape) = master_shape {
                data.merge_from(&own_level_font(master_shape, level));
            }
        }
    }

    // Terminal fill: the master's category default at this level, then the
    // theme font scheme typeface.
    if !data.is_filled() {
        if let Some(master_default) = ctx.master_styles.category_for(shape).get(&level) {
            data.merge_from(master_default);
        }
        if data.latin.is_none() {
            data.latin = match shape.placeholder() {
                Some(key) if key.kind == "title" || key.kind == "ctrTitle" => {
                    ctx.theme.major_latin.clone()
                }
                _ => ctx.theme.minor_latin.clone(),
            };
        }
    }

    data
}

/// A shape's own font data at a level: its list style, with the
/// end-paragraph-size fallback applied by the text frame.
fn own_level_font(shape: &Shape, level: u8) -> FontData {
    shape
        .text_frame()
        .ok()
        .flatten()
        .and_then(|tf| tf.level_font(level))
        .unwrap_or_default()
}

/// A portion's effective font: its explicit fields merged over the shape's
/// resolved cascade at the portion's paragraph level. Always per-portion,
/// never averaged across a paragraph.
pub fn effective_portion_font(portion_font: &FontData, resolved: &FontData) -> FontData {
    let mut data = portion_font.clone();
    data.merge_from(resolved);
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pptx::shapes::shape::ShapeKind;

    fn placeholder_sp(id: u32, name: &str, ph: &str, idx: u32, lst_style: &str) -> Shape {
        let xml = format!(
            r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="{name}"/><p:cNvSpPr/><p:nvPr><p:ph type="{ph}" idx="{idx}"/></p:nvPr></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/>{lst_style}<a:p><a:endParaRPr lang="en-US"/></a:p></p:txBody></p:sp>"#
        );
        Shape::from_xml(xml.into_bytes(), ShapeKind::AutoShape).unwrap()
    }

    fn tree_with(shapes: &[&Shape]) -> ShapeTree {
        let mut body = String::new();
        for s in shapes {
            body.push_str(std::str::from_utf8(s.xml()).unwrap());
        }
        let xml = format!(
            r#"<p:sld><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/></p:nvGrpSpPr><p:grpSpPr/>{body}</p:spTree></p:cSld></p:sld>"#
        );
        ShapeTree::parse(xml.as_bytes()).unwrap()
    }

    const SIZE_18: &str =
        r#"<a:lstStyle><a:lvl1pPr><a:defRPr sz="1800"/></a:lvl1pPr></a:lstStyle>"#;
    const SIZE_32: &str =
        r#"<a:lstStyle><a:lvl1pPr><a:defRPr sz="3200"/></a:lvl1pPr></a:lstStyle>"#;

    #[test]
    fn test_master_value_reaches_slide_through_unset_chain() {
        // Master defines 18pt at level 0; layout and slide leave it unset.
        let slide_shape = placeholder_sp(2, "Title 1", "title", 1, "");
        let layout_shape = placeholder_sp(2, "Title Placeholder", "title", 1, "");
        let master_shape = placeholder_sp(2, "Title Master", "title", 1, SIZE_18);

        let layout_tree = tree_with(&[&layout_shape]);
        let master_tree = tree_with(&[&master_shape]);
        let styles = MasterTextStyles::default();
        let theme = Theme::default();

        let ctx = CascadeContext {
            layout_tree: Some(&layout_tree),
            master_tree: Some(&master_tree),
            master_styles: &styles,
            theme: &theme,
        };

        let resolved = resolve_font(&ctx, &slide_shape, 0);
        assert_eq!(resolved.size, Some(1800));
    }

    #[test]
    fn test_explicit_field_shadows_ancestors() {
        let slide_shape = placeholder_sp(2, "Title 1", "title", 1, SIZE_32);
        let master_shape = placeholder_sp(2, "Title Master", "title", 1, SIZE_18);

        let master_tree = tree_with(&[&master_shape]);
        let styles = MasterTextStyles::default();
        let theme = Theme::default();

        let ctx = CascadeContext {
            layout_tree: None,
            master_tree: Some(&master_tree),
            master_styles: &styles,
            theme: &theme,
        };

        let resolved = resolve_font(&ctx, &slide_shape, 0);
        assert_eq!(resolved.size, Some(3200));
    }

    #[test]
    fn test_layout_wins_over_master() {
        let slide_shape = placeholder_sp(2, "Title 1", "title", 1, "");
        let layout_shape = placeholder_sp(2, "Title Layout", "title", 1, SIZE_32);
        let master_shape = placeholder_sp(2, "Title Master", "title", 1, SIZE_18);

        let layout_tree = tree_with(&[&layout_shape]);
        let master_tree = tree_with(&[&master_shape]);
        let styles = MasterTextStyles::default();
        let theme = Theme::default();

        let ctx = CascadeContext {
            layout_tree: Some(&layout_tree),
            master_tree: Some(&master_tree),
            master_styles: &styles,
            theme: &theme,
        };

        assert_eq!(resolve_font(&ctx, &slide_shape, 0).size, Some(3200));
    }

    #[test]
    fn test_placeholder_match_is_by_key_not_position() {
        let slide_shape = placeholder_sp(2, "Body 1", "body", 3, "");
        // Master tree holds an unrelated placeholder first; only {body, 3}
        // may match.
        let other = placeholder_sp(2, "Title Master", "title", 1, SIZE_32);
        let matching = placeholder_sp(3, "Body Master", "body", 3, SIZE_18);
        let master_tree = tree_with(&[&other, &matching]);

        let styles = MasterTextStyles::default();
        let theme = Theme::default();
        let ctx = CascadeContext {
            layout_tree: None,
            master_tree: Some(&master_tree),
            master_styles: &styles,
            theme: &theme,
        };

        assert_eq!(resolve_font(&ctx, &slide_shape, 0).size, Some(1800));
    }

    #[test]
    fn test_master_category_styles_and_theme_fill_terminally() {
        let master_xml = br#"<p:sldMaster><p:txStyles><p:titleStyle><a:lvl1pPr><a:defRPr sz="4400" b="1"/></a:lvl1pPr></p:titleStyle><p:bodyStyle><a:lvl1pPr><a:defRPr sz="2800"/></a:lvl1pPr></p:bodyStyle></p:txStyles></p:sldMaster>"#;
        let styles = MasterTextStyles::parse(master_xml);
        let theme = Theme {
            major_latin: Some("Calibri Light".to_string()),
            minor_latin: Some("Calibri".to_string()),
            ..Default::default()
        };

        let title_shape = placeholder_sp(2, "Title 1", "title", 1, "");
        let body_shape = placeholder_sp(3, "Body 1", "body", 2, "");

        let ctx = CascadeContext {
            layout_tree: None,
            master_tree: None,
            master_styles: &styles,
            theme: &theme,
        };

        let title = resolve_font(&ctx, &title_shape, 0);
        assert_eq!(title.size, Some(4400));
        assert_eq!(title.bold, Some(true));
        assert_eq!(title.latin.as_deref(), Some("Calibri Light"));

        let body = resolve_font(&ctx, &body_shape, 0);
        assert_eq!(body.size, Some(2800));
        assert_eq!(body.latin.as_deref(), Some("Calibri"));
    }

    #[test]
    fn test_exhausted_chain_yields_empty_default() {
        let shape = placeholder_sp(2, "Title 1", "title", 1, "");
        let styles = MasterTextStyles::default();
        let theme = Theme::default();
        let ctx = CascadeContext {
            layout_tree: None,
            master_tree: None,
            master_styles: &styles,
            theme: &theme,
        };

        let resolved = resolve_font(&ctx, &shape, 0);
        assert_eq!(resolved, FontData::default());
    }

    #[test]
    fn test_portion_explicit_over_resolved() {
        let portion = FontData {
            size: Some(2000),
            ..Default::default()
        };
        let resolved = FontData {
            size: Some(1800),
            latin: Some("Calibri".to_string()),
            ..Default::default()
        };

        let effective = effective_portion_font(&portion, &resolved);
        assert_eq!(effective.size, Some(2000));
        assert_eq!(effective.latin.as_deref(), Some("Calibri"));
    }
}
