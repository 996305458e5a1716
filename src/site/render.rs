//! HTML Rendering
//!
//! Turns parsed poems into the markup served by the site. The output is
//! plain string building; every page is self-contained apart from the
//! stylesheet and the media directory.

use std::fmt::Write;

use super::generator::SiteConfig;
use super::model::{MediaKind, MediaRef, PoemBlock, PoemUnit, UnitItem};

/// Click-to-enlarge behaviour for images, inlined on every page.
const ENLARGE_IMAGE_SCRIPT: &str = r#"
  document.addEventListener('DOMContentLoaded', function() {
    document.querySelectorAll('img').forEach(function(img) {
      img.addEventListener('click', function(e) {
        if (img.classList.contains('enlarged-image')) {
          img.classList.remove('enlarged-image');
          const backdrop = document.querySelector('.enlarged-image-backdrop');
          if (backdrop) backdrop.remove();
        } else {
          const backdrop = document.createElement('div');
          backdrop.className = 'enlarged-image-backdrop';
          backdrop.onclick = function() {
            img.classList.remove('enlarged-image');
            backdrop.remove();
          };
          document.body.appendChild(backdrop);
          img.classList.add('enlarged-image');
        }
        e.stopPropagation();
      });
    });
  });
        "#;

/// Escapes `&`, `<` and `>` for use in element text.
pub fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Escapes text for use inside a double-quoted attribute.
fn attr_escape(text: &str) -> String {
    html_escape(text).replace('"', "&quot;")
}

/// File name of a page; page 1 is the site's index.
pub fn page_file_name(page: usize) -> String {
    if page <= 1 {
        "index.html".to_string()
    } else {
        format!("page{}.html", page)
    }
}

/// Number of pages needed for `blocks` poems at `per_page` poems per page.
pub fn page_count(blocks: usize, per_page: usize) -> usize {
    if per_page == 0 {
        return 0;
    }
    blocks.div_ceil(per_page)
}

fn render_media(out: &mut String, media: &MediaRef, media_dir: &str) {
    let src = attr_escape(&format!("{}/{}", media_dir, media.filename));
    let style = media
        .width
        .as_ref()
        .map(|w| format!(" style=\"width:{}px\"", w))
        .unwrap_or_default();

    match media.kind() {
        MediaKind::Video => {
            let _ = writeln!(
                out,
                "    <video src=\"{}\" controls loop{} preload=\"metadata\">Your browser does not support the video tag.</video>",
                src, style
            );
        }
        MediaKind::Image => {
            let _ = writeln!(
                out,
                "    <img src=\"{}\" alt=\"{}\"{}>",
                src,
                attr_escape(&media.alt_text()),
                style
            );
        }
    }
}

/// Renders the inner markup of a unit.
///
/// Links and media appear in source order; all text lines follow as one
/// preformatted block.
pub fn render_unit(unit: &PoemUnit, config: &SiteConfig) -> String {
    let mut out = String::new();

    for item in &unit.items {
        match item {
            UnitItem::Link(url) => {
                let url = attr_escape(url);
                let _ = writeln!(out, "  <a href=\"{}\" target=\"_blank\">{}</a>", url, url);
            }
            UnitItem::Media { layout, media } => {
                let _ = writeln!(out, "  <div class=\"{}\">", layout.css_class());
                for entry in media {
                    render_media(&mut out, entry, &config.media_dir);
                }
                out.push_str("  </div>\n");
            }
            UnitItem::Line(_) => {}
        }
    }

    let lines = unit.text_lines();
    if !lines.is_empty() {
        let _ = writeln!(out, "  <pre>{}</pre>", html_escape(&lines.join("\n")));
    }

    out
}

/// Renders a poem block with its units separated by line breaks.
pub fn render_block(block: &PoemBlock, config: &SiteConfig) -> String {
    let units: Vec<String> = block
        .units
        .iter()
        .map(|unit| {
            let class = if unit.uses_left_layout() {
                "poem-unit left-image"
            } else {
                "poem-unit"
            };
            format!("<div class=\"{}\">\n{}</div>", class, render_unit(unit, config))
        })
        .collect();

    format!("<div class=\"poem-block\">\n{}\n</div>", units.join("\n<br>\n"))
}

fn render_pagination(out: &mut String, page: usize, total: usize) {
    out.push_str(
        "<div class=\"pagination\" style=\"text-align:center;margin:2em 0 1em 0;font-size:1.2em;\">\n",
    );
    if page > 1 {
        let _ = write!(out, "<a href=\"{}\">&laquo; Prev</a> ", page_file_name(page - 1));
    }
    let _ = write!(out, " Page {} of {} ", page, total);
    if page < total {
        let _ = write!(out, "<a href=\"{}\">Next &raquo;</a>", page_file_name(page + 1));
    }
    out.push_str("</div>\n");
}

/// Renders a complete HTML page from already rendered blocks.
///
/// `page` is 1-based. The last page closes with "The end.".
pub fn render_page(blocks: &[String], page: usize, total: usize, config: &SiteConfig) -> String {
    let title = html_escape(&config.title);
    let mut out = String::new();

    out.push_str("<!DOCTYPE html>\n");
    out.push_str("<html lang=\"en\">\n");
    out.push_str("<head>\n");
    out.push_str("  <meta charset=\"UTF-8\">\n");
    let _ = writeln!(out, "  <title>{}</title>", title);
    out.push_str(
        "  <meta http-equiv=\"Cache-Control\" content=\"no-store, no-cache, must-revalidate\">\n",
    );
    out.push_str("  <meta http-equiv=\"Pragma\" content=\"no-cache\">\n");
    out.push_str("  <meta http-equiv=\"Expires\" content=\"0\">\n");
    let _ = writeln!(
        out,
        "  <link rel=\"stylesheet\" href=\"{}\">",
        attr_escape(&config.stylesheet)
    );
    out.push_str("</head>\n");
    out.push_str("<body>\n");
    out.push_str("  <header class=\"banner\">\n");
    let _ = writeln!(out, "    <h1>{}</h1>", title);
    out.push_str("  </header>\n");
    out.push_str("  <main>\n");

    for block in blocks {
        out.push_str(block);
        out.push_str("\n    <hr>\n");
    }

    if page == total {
        out.push_str("The end.\n");
    }

    render_pagination(&mut out, page, total);

    out.push_str("  </main>\n");
    out.push_str("  <script>\n");
    out.push_str(ENLARGE_IMAGE_SCRIPT);
    out.push_str("  </script>\n");
    out.push_str("</body>\n");
    out.push_str("</html>\n");

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::model::MediaLayout;
    use crate::site::parser::parse_unit;

    fn config() -> SiteConfig {
        SiteConfig::default()
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("a < b && c > d"), "a &lt; b &amp;&amp; c &gt; d");
        assert_eq!(html_escape("\"quoted\""), "\"quoted\"");
    }

    #[test]
    fn test_page_file_names() {
        assert_eq!(page_file_name(1), "index.html");
        assert_eq!(page_file_name(2), "page2.html");
        assert_eq!(page_file_name(12), "page12.html");
    }

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(0, 5), 0);
        assert_eq!(page_count(1, 5), 1);
        assert_eq!(page_count(5, 5), 1);
        assert_eq!(page_count(6, 5), 2);
        assert_eq!(page_count(3, 0), 0);
    }

    #[test]
    fn test_render_unit_text_only() {
        let unit = parse_unit("roses & <thorns>\nsecond").unwrap();
        assert_eq!(
            render_unit(&unit, &config()),
            "  <pre>roses &amp; &lt;thorns&gt;\nsecond</pre>\n"
        );
    }

    #[test]
    fn test_render_unit_text_follows_directives() {
        let unit = parse_unit("before\nlink: https://example.com\nafter").unwrap();
        assert_eq!(
            render_unit(&unit, &config()),
            "  <a href=\"https://example.com\" target=\"_blank\">https://example.com</a>\n  <pre>before\nafter</pre>\n"
        );
    }

    #[test]
    fn test_render_unit_link_query_is_escaped() {
        let unit = parse_unit("link: https://example.com/?a=1&b=\"2\"").unwrap();
        assert_eq!(
            render_unit(&unit, &config()),
            "  <a href=\"https://example.com/?a=1&amp;b=&quot;2&quot;\" target=\"_blank\">https://example.com/?a=1&amp;b=&quot;2&quot;</a>\n"
        );
    }

    #[test]
    fn test_render_unit_media_row() {
        let unit = PoemUnit {
            items: vec![UnitItem::Media {
                layout: MediaLayout::Row,
                media: vec![
                    MediaRef::new("sea_side.jpg").with_width("300"),
                    MediaRef::new("waves.mp4"),
                ],
            }],
        };

        let expected = concat!(
            "  <div class=\"image-row\">\n",
            "    <img src=\"images/sea_side.jpg\" alt=\"sea side\" style=\"width:300px\">\n",
            "    <video src=\"images/waves.mp4\" controls loop preload=\"metadata\">Your browser does not support the video tag.</video>\n",
            "  </div>\n",
        );
        assert_eq!(render_unit(&unit, &config()), expected);
    }

    #[test]
    fn test_render_unit_width_as_written() {
        let unit = parse_unit("top: gull.jpg[0480]").unwrap();
        assert!(render_unit(&unit, &config()).contains(" style=\"width:0480px\">"));
    }

    #[test]
    fn test_render_unit_without_text_has_no_pre() {
        let unit = parse_unit("left: a.jpg").unwrap();
        let html = render_unit(&unit, &config());
        assert!(html.contains("image-column"));
        assert!(!html.contains("<pre>"));
    }

    #[test]
    fn test_render_block_joins_units() {
        let block = PoemBlock {
            units: vec![
                parse_unit("first").unwrap(),
                parse_unit("left: b.jpg\nsecond").unwrap(),
            ],
        };

        let expected = concat!(
            "<div class=\"poem-block\">\n",
            "<div class=\"poem-unit\">\n  <pre>first</pre>\n</div>",
            "\n<br>\n",
            "<div class=\"poem-unit left-image\">\n",
            "  <div class=\"image-column\">\n",
            "    <img src=\"images/b.jpg\" alt=\"b\">\n",
            "  </div>\n",
            "  <pre>second</pre>\n",
            "</div>",
            "\n</div>",
        );
        assert_eq!(render_block(&block, &config()), expected);
    }

    #[test]
    fn test_render_page_single() {
        let html = render_page(&["<div>x</div>".to_string()], 1, 1, &config());

        assert!(html.starts_with("<!DOCTYPE html>\n<html lang=\"en\">\n"));
        assert!(html.contains("  <title>Everyday Majestic Musings</title>\n"));
        assert!(html.contains("<div>x</div>\n    <hr>\nThe end.\n"));
        assert!(html.contains(" Page 1 of 1 </div>\n"));
        assert!(!html.contains("Prev"));
        assert!(!html.contains("Next"));
        assert!(html.ends_with("  </script>\n</body>\n</html>\n"));
    }

    #[test]
    fn test_render_page_navigation() {
        let first = render_page(&[], 1, 3, &config());
        assert!(first.contains(" Page 1 of 3 <a href=\"page2.html\">Next &raquo;</a></div>"));
        assert!(!first.contains("The end."));

        let second = render_page(&[], 2, 3, &config());
        assert!(second.contains("<a href=\"index.html\">&laquo; Prev</a>  Page 2 of 3 "));
        assert!(second.contains("<a href=\"page3.html\">Next &raquo;</a>"));

        let last = render_page(&[], 3, 3, &config());
        assert!(last.contains("<a href=\"page2.html\">&laquo; Prev</a>  Page 3 of 3 </div>"));
        assert!(last.contains("The end.\n"));
    }

    #[test]
    fn test_render_page_custom_title_is_escaped() {
        let mut config = config();
        config.title = "Salt & Stone".to_string();

        let html = render_page(&[], 1, 1, &config);
        assert!(html.contains("<title>Salt &amp; Stone</title>"));
        assert!(html.contains("<h1>Salt &amp; Stone</h1>"));
    }
}
