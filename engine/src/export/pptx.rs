//! Minimal Office Open XML presentation writer.
//!
//! Produces one master, one blank layout and one theme, then a slide per
//! [`Slide`] built from plain text boxes and embedded pictures. Everything is
//! written into an in-memory zip archive.

use sdk::errors::EngineError;
use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::ZipWriter;

use super::{Deck, ImageFormat, Slide, SlideImage};

pub const PPTX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";

const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
const NS_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

// 16:9 slide in EMU
const SLIDE_CX: u64 = 12_192_000;
const SLIDE_CY: u64 = 6_858_000;
const MARGIN: u64 = 457_200;
const TITLE_Y: u64 = 304_800;
const TITLE_CY: u64 = 1_066_800;
const BODY_Y: u64 = 1_524_000;
const GAP: u64 = 228_600;

/// Package a deck as a `.pptx` archive
pub fn write_pptx(deck: &Deck) -> Result<Vec<u8>, EngineError> {
    write_archive(deck).map_err(|e| EngineError::Export(e.to_string()))
}

fn write_archive(deck: &Deck) -> zip::result::ZipResult<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let mut parts: Vec<(String, Vec<u8>)> = vec![
        ("[Content_Types].xml".to_string(), content_types(deck).into_bytes()),
        ("_rels/.rels".to_string(), root_rels().into_bytes()),
        ("docProps/core.xml".to_string(), core_props(&deck.title).into_bytes()),
        ("docProps/app.xml".to_string(), app_props(deck.slides.len()).into_bytes()),
        ("ppt/presentation.xml".to_string(), presentation(deck.slides.len()).into_bytes()),
        (
            "ppt/_rels/presentation.xml.rels".to_string(),
            presentation_rels(deck.slides.len()).into_bytes(),
        ),
        ("ppt/slideMasters/slideMaster1.xml".to_string(), slide_master().into_bytes()),
        (
            "ppt/slideMasters/_rels/slideMaster1.xml.rels".to_string(),
            slide_master_rels().into_bytes(),
        ),
        ("ppt/slideLayouts/slideLayout1.xml".to_string(), slide_layout().into_bytes()),
        (
            "ppt/slideLayouts/_rels/slideLayout1.xml.rels".to_string(),
            slide_layout_rels().into_bytes(),
        ),
        ("ppt/theme/theme1.xml".to_string(), theme().into_bytes()),
    ];

    let mut media_index = 0;
    for (index, slide) in deck.slides.iter().enumerate() {
        let number = index + 1;
        let mut media_names = Vec::with_capacity(slide.images.len());
        for image in &slide.images {
            media_index += 1;
            let name = format!("image{}.{}", media_index, image.format.extension());
            parts.push((format!("ppt/media/{}", name), image.bytes.clone()));
            media_names.push(name);
        }
        parts.push((
            format!("ppt/slides/slide{}.xml", number),
            slide_xml(slide).into_bytes(),
        ));
        parts.push((
            format!("ppt/slides/_rels/slide{}.xml.rels", number),
            slide_rels(&media_names).into_bytes(),
        ));
    }

    for (name, bytes) in parts {
        zip.start_file(name, options)?;
        zip.write_all(&bytes)?;
    }
    zip.finish()?;
    drop(zip);

    Ok(buffer)
}

/// Escape text for XML element content and attribute values, dropping
/// characters XML 1.0 cannot carry.
pub fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            '\t' | '\n' | '\r' => escaped.push(' '),
            c if (c as u32) < 0x20 => {}
            '\u{FFFE}' | '\u{FFFF}' => {}
            c => escaped.push(c),
        }
    }
    escaped
}

fn content_types(deck: &Deck) -> String {
    let mut overrides = String::new();
    for number in 1..=deck.slides.len() {
        overrides.push_str(&format!(
            r#"<Override PartName="/ppt/slides/slide{}.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/>"#,
            number
        ));
    }
    format!(
        r#"{XML_DECL}<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/><Default Extension="jpeg" ContentType="image/jpeg"/><Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/><Override PartName="/ppt/slideMasters/slideMaster1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml"/><Override PartName="/ppt/slideLayouts/slideLayout1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml"/><Override PartName="/ppt/theme/theme1.xml" ContentType="application/vnd.openxmlformats-officedocument.theme+xml"/><Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/><Override PartName="/docProps/app.xml" ContentType="application/vnd.openxmlformats-officedocument.extended-properties+xml"/>{overrides}</Types>"#
    )
}

fn root_rels() -> String {
    format!(
        r#"{XML_DECL}<Relationships xmlns="{NS_REL}"><Relationship Id="rId1" Type="{REL_BASE}/officeDocument" Target="ppt/presentation.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/><Relationship Id="rId3" Type="{REL_BASE}/extended-properties" Target="docProps/app.xml"/></Relationships>"#
    )
}

fn core_props(title: &str) -> String {
    let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
    let title = escape_xml(title);
    format!(
        r#"{XML_DECL}<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><dc:title>{title}</dc:title><dc:creator>Uchronia</dc:creator><dcterms:created xsi:type="dcterms:W3CDTF">{now}</dcterms:created><dcterms:modified xsi:type="dcterms:W3CDTF">{now}</dcterms:modified></cp:coreProperties>"#
    )
}

fn app_props(slides: usize) -> String {
    format!(
        r#"{XML_DECL}<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties"><Application>Uchronia</Application><Slides>{slides}</Slides></Properties>"#
    )
}

fn presentation(slides: usize) -> String {
    // rId1 is the master, rId2 the theme, slides start at rId3
    let slide_ids: String = (0..slides)
        .map(|i| format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 256 + i, 3 + i))
        .collect();
    format!(
        r#"{XML_DECL}<p:presentation xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst><p:sldIdLst>{slide_ids}</p:sldIdLst><p:sldSz cx="{SLIDE_CX}" cy="{SLIDE_CY}"/><p:notesSz cx="{SLIDE_CY}" cy="9144000"/></p:presentation>"#
    )
}

fn presentation_rels(slides: usize) -> String {
    let slide_rels: String = (0..slides)
        .map(|i| {
            format!(
                r#"<Relationship Id="rId{}" Type="{REL_BASE}/slide" Target="slides/slide{}.xml"/>"#,
                3 + i,
                1 + i
            )
        })
        .collect();
    format!(
        r#"{XML_DECL}<Relationships xmlns="{NS_REL}"><Relationship Id="rId1" Type="{REL_BASE}/slideMaster" Target="slideMasters/slideMaster1.xml"/><Relationship Id="rId2" Type="{REL_BASE}/theme" Target="theme/theme1.xml"/>{slide_rels}</Relationships>"#
    )
}

fn empty_tree() -> &'static str {
    r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#
}

fn slide_master() -> String {
    let tree = empty_tree();
    format!(
        r#"{XML_DECL}<p:sldMaster xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"><p:cSld><p:spTree>{tree}</p:spTree></p:cSld><p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/><p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst><p:txStyles><p:titleStyle><a:lvl1pPr><a:defRPr sz="3200"/></a:lvl1pPr></p:titleStyle><p:bodyStyle><a:lvl1pPr><a:defRPr sz="1800"/></a:lvl1pPr></p:bodyStyle><p:otherStyle><a:lvl1pPr><a:defRPr sz="1800"/></a:lvl1pPr></p:otherStyle></p:txStyles></p:sldMaster>"#
    )
}

fn slide_master_rels() -> String {
    format!(
        r#"{XML_DECL}<Relationships xmlns="{NS_REL}"><Relationship Id="rId1" Type="{REL_BASE}/slideLayout" Target="../slideLayouts/slideLayout1.xml"/><Relationship Id="rId2" Type="{REL_BASE}/theme" Target="../theme/theme1.xml"/></Relationships>"#
    )
}

fn slide_layout() -> String {
    let tree = empty_tree();
    format!(
        r#"{XML_DECL}<p:sldLayout xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}" type="blank" preserve="1"><p:cSld name="Blank"><p:spTree>{tree}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#
    )
}

fn slide_layout_rels() -> String {
    format!(
        r#"{XML_DECL}<Relationships xmlns="{NS_REL}"><Relationship Id="rId1" Type="{REL_BASE}/slideMaster" Target="../slideMasters/slideMaster1.xml"/></Relationships>"#
    )
}

fn theme() -> String {
    let colors = [
        ("dk1", "1F1B16"),
        ("lt1", "FBF7EF"),
        ("dk2", "3B2F2F"),
        ("lt2", "EDE3D1"),
        ("accent1", "8C5A2B"),
        ("accent2", "B08D57"),
        ("accent3", "5B7065"),
        ("accent4", "7A4E6B"),
        ("accent5", "3E5C76"),
        ("accent6", "A23E48"),
        ("hlink", "3E5C76"),
        ("folHlink", "7A4E6B"),
    ];
    let clr_scheme: String = colors
        .iter()
        .map(|(name, rgb)| format!(r#"<a:{name}><a:srgbClr val="{rgb}"/></a:{name}>"#))
        .collect();
    let fill = r#"<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>"#;
    let line = r#"<a:ln w="9525"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln>"#;
    let effect = r#"<a:effectStyle><a:effectLst/></a:effectStyle>"#;
    format!(
        r#"{XML_DECL}<a:theme xmlns:a="{NS_A}" name="Uchronia"><a:themeElements><a:clrScheme name="Uchronia">{clr_scheme}</a:clrScheme><a:fontScheme name="Uchronia"><a:majorFont><a:latin typeface="Georgia"/><a:ea typeface=""/><a:cs typeface=""/></a:majorFont><a:minorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:minorFont></a:fontScheme><a:fmtScheme name="Uchronia"><a:fillStyleLst>{fill}{fill}{fill}</a:fillStyleLst><a:lnStyleLst>{line}{line}{line}</a:lnStyleLst><a:effectStyleLst>{effect}{effect}{effect}</a:effectStyleLst><a:bgFillStyleLst>{fill}{fill}{fill}</a:bgFillStyleLst></a:fmtScheme></a:themeElements></a:theme>"#
    )
}

fn text_box(id: usize, name: &str, x: u64, y: u64, cx: u64, cy: u64, paragraphs: &str) -> String {
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="{name}"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr><a:xfrm><a:off x="{x}" y="{y}"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:noFill/></p:spPr><p:txBody><a:bodyPr wrap="square" rtlCol="0"><a:normAutofit/></a:bodyPr><a:lstStyle/>{paragraphs}</p:txBody></p:sp>"#
    )
}

fn title_paragraph(title: &str) -> String {
    format!(
        r#"<a:p><a:r><a:rPr lang="en-US" sz="3200" b="1" dirty="0"><a:latin typeface="+mj-lt"/></a:rPr><a:t>{}</a:t></a:r></a:p>"#,
        escape_xml(title)
    )
}

fn bullet_paragraphs(bullets: &[String]) -> String {
    if bullets.is_empty() {
        return "<a:p><a:endParaRPr lang=\"en-US\"/></a:p>".to_string();
    }
    bullets
        .iter()
        .map(|bullet| {
            format!(
                r#"<a:p><a:pPr marL="285750" indent="-285750"><a:buFont typeface="Arial"/><a:buChar char="&#8226;"/></a:pPr><a:r><a:rPr lang="en-US" sz="1800" dirty="0"/><a:t>{}</a:t></a:r></a:p>"#,
                escape_xml(bullet)
            )
        })
        .collect()
}

fn picture(id: usize, rel_id: usize, x: u64, y: u64, cx: u64, cy: u64) -> String {
    format!(
        r#"<p:pic><p:nvPicPr><p:cNvPr id="{id}" name="Image {rel_id}"/><p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="rId{rel_id}"/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr><a:xfrm><a:off x="{x}" y="{y}"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic>"#
    )
}

fn slide_xml(slide: &Slide) -> String {
    let width = SLIDE_CX - 2 * MARGIN;
    let body_bottom = SLIDE_CY - MARGIN;
    let mut shapes = text_box(
        2,
        "Title",
        MARGIN,
        TITLE_Y,
        width,
        TITLE_CY,
        &title_paragraph(&slide.title),
    );

    if slide.images.is_empty() {
        shapes.push_str(&text_box(
            3,
            "Body",
            MARGIN,
            BODY_Y,
            width,
            body_bottom - BODY_Y,
            &bullet_paragraphs(&slide.bullets),
        ));
    } else {
        // Images share the body area; any bullets get a strip underneath
        let caption_cy = if slide.bullets.is_empty() { 0 } else { 1_097_280 };
        let area_cy = body_bottom - BODY_Y - caption_cy;
        let count = slide.images.len() as u64;
        let cell_cx = (width - GAP * (count - 1)) / count;

        for (i, image) in slide.images.iter().enumerate() {
            let (cx, cy) = fit(image, cell_cx, area_cy);
            let cell_x = MARGIN + i as u64 * (cell_cx + GAP);
            let x = cell_x + (cell_cx - cx) / 2;
            let y = BODY_Y + (area_cy - cy) / 2;
            shapes.push_str(&picture(3 + i, 2 + i, x, y, cx, cy));
        }

        if caption_cy > 0 {
            shapes.push_str(&text_box(
                3 + slide.images.len(),
                "Captions",
                MARGIN,
                body_bottom - caption_cy,
                width,
                caption_cy,
                &bullet_paragraphs(&slide.bullets),
            ));
        }
    }

    let tree = empty_tree();
    format!(
        r#"{XML_DECL}<p:sld xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"><p:cSld><p:spTree>{tree}{shapes}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#
    )
}

fn slide_rels(media: &[String]) -> String {
    let images: String = media
        .iter()
        .enumerate()
        .map(|(i, name)| {
            format!(
                r#"<Relationship Id="rId{}" Type="{REL_BASE}/image" Target="../media/{}"/>"#,
                2 + i,
                name
            )
        })
        .collect();
    format!(
        r#"{XML_DECL}<Relationships xmlns="{NS_REL}"><Relationship Id="rId1" Type="{REL_BASE}/slideLayout" Target="../slideLayouts/slideLayout1.xml"/>{images}</Relationships>"#
    )
}

/// Scale an image into a `max_cx` x `max_cy` box keeping its aspect ratio
fn fit(image: &SlideImage, max_cx: u64, max_cy: u64) -> (u64, u64) {
    let (w, h) = pixel_size(image).unwrap_or((1, 1));
    let (w, h) = (u64::from(w.max(1)), u64::from(h.max(1)));
    if max_cx * h <= max_cy * w {
        (max_cx, max_cx * h / w)
    } else {
        (max_cy * w / h, max_cy)
    }
}

/// Width and height from a PNG header or a JPEG start-of-frame marker
fn pixel_size(image: &SlideImage) -> Option<(u32, u32)> {
    let bytes = &image.bytes;
    match image.format {
        ImageFormat::Png => {
            if bytes.len() < 24 || &bytes[..8] != b"\x89PNG\r\n\x1a\n" {
                return None;
            }
            let w = u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
            let h = u32::from_be_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]);
            Some((w, h))
        }
        ImageFormat::Jpeg => {
            let mut i = 2;
            while i + 9 < bytes.len() {
                if bytes[i] != 0xFF {
                    return None;
                }
                let marker = bytes[i + 1];
                let length = usize::from(u16::from_be_bytes([bytes[i + 2], bytes[i + 3]]));
                if matches!(marker, 0xC0..=0xC3) {
                    let h = u16::from_be_bytes([bytes[i + 5], bytes[i + 6]]);
                    let w = u16::from_be_bytes([bytes[i + 7], bytes[i + 8]]);
                    return Some((u32::from(w), u32::from(h)));
                }
                i += 2 + length;
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn deck() -> Deck {
        Deck {
            title: "Smartphone in 1800s".to_string(),
            slides: vec![
                Slide {
                    title: "Smartphone & <friends>".to_string(),
                    bullets: vec!["What if \"phones\" came early?".to_string()],
                    images: Vec::new(),
                },
                Slide {
                    title: "Visualizations".to_string(),
                    bullets: Vec::new(),
                    images: vec![SlideImage {
                        bytes: b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\x07\x00\0\0\x04\x00rest".to_vec(),
                        format: ImageFormat::Png,
                    }],
                },
            ],
        }
    }

    #[test]
    fn test_archive_contains_required_parts() {
        let bytes = write_pptx(&deck()).unwrap();
        assert_eq!(&bytes[..2], b"PK");

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        for name in [
            "[Content_Types].xml",
            "_rels/.rels",
            "ppt/presentation.xml",
            "ppt/_rels/presentation.xml.rels",
            "ppt/slideMasters/slideMaster1.xml",
            "ppt/slideLayouts/slideLayout1.xml",
            "ppt/theme/theme1.xml",
            "ppt/slides/slide1.xml",
            "ppt/slides/slide2.xml",
            "ppt/slides/_rels/slide2.xml.rels",
            "ppt/media/image1.png",
        ] {
            assert!(archive.by_name(name).is_ok(), "missing {}", name);
        }

        let mut slide = String::new();
        archive
            .by_name("ppt/slides/slide1.xml")
            .unwrap()
            .read_to_string(&mut slide)
            .unwrap();
        assert!(slide.contains("Smartphone &amp; &lt;friends&gt;"));
        assert!(slide.contains("&quot;phones&quot;"));

        let mut rels = String::new();
        archive
            .by_name("ppt/slides/_rels/slide2.xml.rels")
            .unwrap()
            .read_to_string(&mut rels)
            .unwrap();
        assert!(rels.contains("../media/image1.png"));
    }

    #[test]
    fn test_escape_xml_drops_control_characters() {
        assert_eq!(escape_xml("a\u{1}b\nc"), "ab c");
        assert_eq!(escape_xml("x's"), "x&apos;s");
        assert_eq!(escape_xml("a\u{FFFE}b\u{FFFF}c\u{FFFD}"), "abc\u{FFFD}");
    }

    #[test]
    fn test_fit_keeps_aspect_ratio() {
        let deck = deck();
        let image = &deck.slides[1].images[0];
        assert_eq!(pixel_size(image), Some((1792, 1024)));
        let (cx, cy) = fit(image, 1792, 2000);
        assert_eq!((cx, cy), (1792, 1024));
        let (cx, cy) = fit(image, 4000, 512);
        assert_eq!((cx, cy), (896, 512));
    }
}
