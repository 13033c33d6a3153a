//! PPTX 容器写入（OPC zip + OOXML 分部件）
//!
//! 每帧一页，图片按纵横比适配 16:9 页面并居中。所有 zip 条目用
//! Stored 方式和固定时间戳写入，同样的输入产出字节一致的文档。

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::core::video::frame::RetainedFrame;

use super::AssemblyError;

/// 16:9 页面尺寸（EMU）
const SLIDE_CX: u64 = 12_192_000;
const SLIDE_CY: u64 = 6_858_000;
/// 96 DPI 下每像素的 EMU 数
const EMU_PER_PX: u64 = 9_525;

/// 把保留帧序列写成完整的 PPTX 文档字节
pub fn write_deck(frames: &[RetainedFrame], title: &str) -> Result<Vec<u8>, AssemblyError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .last_modified_time(zip::DateTime::default());

    let count = frames.len();

    add_part(&mut writer, options, "[Content_Types].xml", &content_types(count))?;
    add_part(&mut writer, options, "_rels/.rels", ROOT_RELS)?;
    add_part(&mut writer, options, "docProps/core.xml", &core_props(title))?;
    add_part(&mut writer, options, "ppt/presentation.xml", &presentation(count))?;
    add_part(
        &mut writer,
        options,
        "ppt/_rels/presentation.xml.rels",
        &presentation_rels(count),
    )?;
    add_part(&mut writer, options, "ppt/slideMasters/slideMaster1.xml", SLIDE_MASTER)?;
    add_part(
        &mut writer,
        options,
        "ppt/slideMasters/_rels/slideMaster1.xml.rels",
        MASTER_RELS,
    )?;
    add_part(&mut writer, options, "ppt/slideLayouts/slideLayout1.xml", SLIDE_LAYOUT)?;
    add_part(
        &mut writer,
        options,
        "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
        LAYOUT_RELS,
    )?;
    add_part(&mut writer, options, "ppt/theme/theme1.xml", THEME)?;

    for (i, frame) in frames.iter().enumerate() {
        let n = i + 1;
        add_part(
            &mut writer,
            options,
            &format!("ppt/slides/slide{n}.xml"),
            &slide(frame, n),
        )?;
        add_part(
            &mut writer,
            options,
            &format!("ppt/slides/_rels/slide{n}.xml.rels"),
            &slide_rels(n),
        )?;

        writer
            .start_file(format!("ppt/media/image{n}.jpeg"), options)
            .map_err(|e| AssemblyError::Document(e.to_string()))?;
        writer.write_all(&frame.jpeg)?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| AssemblyError::Document(e.to_string()))?;
    Ok(cursor.into_inner())
}

fn add_part(
    writer: &mut ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
    name: &str,
    content: &str,
) -> Result<(), AssemblyError> {
    writer
        .start_file(name, options)
        .map_err(|e| AssemblyError::Document(e.to_string()))?;
    writer.write_all(content.as_bytes())?;
    Ok(())
}

/// 图片适配页面：等比缩放到页面内最大尺寸并居中
fn fit_image(width: u32, height: u32) -> (u64, u64, u64, u64) {
    if width == 0 || height == 0 {
        return (0, 0, SLIDE_CX, SLIDE_CY);
    }

    let native_cx = width as u64 * EMU_PER_PX;
    let native_cy = height as u64 * EMU_PER_PX;

    // 先按宽适配，超高再按高适配
    let mut cx = SLIDE_CX;
    let mut cy = native_cy * SLIDE_CX / native_cx;
    if cy > SLIDE_CY {
        cy = SLIDE_CY;
        cx = native_cx * SLIDE_CY / native_cy;
    }

    let x = (SLIDE_CX - cx) / 2;
    let y = (SLIDE_CY - cy) / 2;
    (x, y, cx, cy)
}

fn content_types(count: usize) -> String {
    let mut overrides = String::new();
    for n in 1..=count {
        overrides.push_str(&format!(
            "<Override PartName=\"/ppt/slides/slide{n}.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.slide+xml\"/>"
        ));
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
<Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
<Default Extension=\"xml\" ContentType=\"application/xml\"/>\
<Default Extension=\"jpeg\" ContentType=\"image/jpeg\"/>\
<Override PartName=\"/docProps/core.xml\" ContentType=\"application/vnd.openxmlformats-package.core-properties+xml\"/>\
<Override PartName=\"/ppt/presentation.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml\"/>\
<Override PartName=\"/ppt/slideMasters/slideMaster1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml\"/>\
<Override PartName=\"/ppt/slideLayouts/slideLayout1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml\"/>\
<Override PartName=\"/ppt/theme/theme1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.theme+xml\"/>\
{overrides}\
</Types>"
    )
}

const ROOT_RELS: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument\" Target=\"ppt/presentation.xml\"/>\
<Relationship Id=\"rId2\" Type=\"http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties\" Target=\"docProps/core.xml\"/>\
</Relationships>";

fn core_props(title: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<cp:coreProperties xmlns:cp=\"http://schemas.openxmlformats.org/package/2006/metadata/core-properties\" \
xmlns:dc=\"http://purl.org/dc/elements/1.1/\">\
<dc:title>{}</dc:title>\
</cp:coreProperties>",
        escape_xml(title)
    )
}

fn presentation(count: usize) -> String {
    let mut slide_ids = String::new();
    for n in 1..=count {
        // rId1 留给母版，页面从 rId2 起
        slide_ids.push_str(&format!(
            "<p:sldId id=\"{}\" r:id=\"rId{}\"/>",
            255 + n,
            n + 1
        ));
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<p:presentation xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\" \
xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\" \
xmlns:p=\"http://schemas.openxmlformats.org/presentationml/2006/main\">\
<p:sldMasterIdLst><p:sldMasterId id=\"2147483648\" r:id=\"rId1\"/></p:sldMasterIdLst>\
<p:sldIdLst>{slide_ids}</p:sldIdLst>\
<p:sldSz cx=\"{SLIDE_CX}\" cy=\"{SLIDE_CY}\"/>\
<p:notesSz cx=\"{SLIDE_CY}\" cy=\"{SLIDE_CX}\"/>\
</p:presentation>"
    )
}

fn presentation_rels(count: usize) -> String {
    let mut rels = String::from(
        "<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster\" Target=\"slideMasters/slideMaster1.xml\"/>",
    );
    for n in 1..=count {
        rels.push_str(&format!(
            "<Relationship Id=\"rId{}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide\" Target=\"slides/slide{n}.xml\"/>",
            n + 1
        ));
    }
    rels.push_str(&format!(
        "<Relationship Id=\"rId{}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme\" Target=\"theme/theme1.xml\"/>",
        count + 2
    ));
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">{rels}</Relationships>"
    )
}

const SLIDE_MASTER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<p:sldMaster xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\" \
xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\" \
xmlns:p=\"http://schemas.openxmlformats.org/presentationml/2006/main\">\
<p:cSld><p:spTree>\
<p:nvGrpSpPr><p:cNvPr id=\"1\" name=\"\"/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>\
<p:grpSpPr/>\
</p:spTree></p:cSld>\
<p:clrMap bg1=\"lt1\" tx1=\"dk1\" bg2=\"lt2\" tx2=\"dk2\" accent1=\"accent1\" accent2=\"accent2\" accent3=\"accent3\" accent4=\"accent4\" accent5=\"accent5\" accent6=\"accent6\" hlink=\"hlink\" folHlink=\"folHlink\"/>\
<p:sldLayoutIdLst><p:sldLayoutId id=\"2147483649\" r:id=\"rId1\"/></p:sldLayoutIdLst>\
</p:sldMaster>";

const MASTER_RELS: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout\" Target=\"../slideLayouts/slideLayout1.xml\"/>\
<Relationship Id=\"rId2\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme\" Target=\"../theme/theme1.xml\"/>\
</Relationships>";

const SLIDE_LAYOUT: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<p:sldLayout xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\" \
xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\" \
xmlns:p=\"http://schemas.openxmlformats.org/presentationml/2006/main\" type=\"blank\">\
<p:cSld><p:spTree>\
<p:nvGrpSpPr><p:cNvPr id=\"1\" name=\"\"/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>\
<p:grpSpPr/>\
</p:spTree></p:cSld>\
<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr>\
</p:sldLayout>";

const LAYOUT_RELS: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster\" Target=\"../slideMasters/slideMaster1.xml\"/>\
</Relationships>";

const THEME: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<a:theme xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\" name=\"Office\">\
<a:themeElements>\
<a:clrScheme name=\"Office\">\
<a:dk1><a:sysClr val=\"windowText\" lastClr=\"000000\"/></a:dk1>\
<a:lt1><a:sysClr val=\"window\" lastClr=\"FFFFFF\"/></a:lt1>\
<a:dk2><a:srgbClr val=\"44546A\"/></a:dk2>\
<a:lt2><a:srgbClr val=\"E7E6E6\"/></a:lt2>\
<a:accent1><a:srgbClr val=\"4472C4\"/></a:accent1>\
<a:accent2><a:srgbClr val=\"ED7D31\"/></a:accent2>\
<a:accent3><a:srgbClr val=\"A5A5A5\"/></a:accent3>\
<a:accent4><a:srgbClr val=\"FFC000\"/></a:accent4>\
<a:accent5><a:srgbClr val=\"5B9BD5\"/></a:accent5>\
<a:accent6><a:srgbClr val=\"70AD47\"/></a:accent6>\
<a:hlink><a:srgbClr val=\"0563C1\"/></a:hlink>\
<a:folHlink><a:srgbClr val=\"954F72\"/></a:folHlink>\
</a:clrScheme>\
<a:fontScheme name=\"Office\">\
<a:majorFont><a:latin typeface=\"Calibri Light\"/><a:ea typeface=\"\"/><a:cs typeface=\"\"/></a:majorFont>\
<a:minorFont><a:latin typeface=\"Calibri\"/><a:ea typeface=\"\"/><a:cs typeface=\"\"/></a:minorFont>\
</a:fontScheme>\
<a:fmtScheme name=\"Office\">\
<a:fillStyleLst><a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill><a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill><a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill></a:fillStyleLst>\
<a:lnStyleLst><a:ln><a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill></a:ln><a:ln><a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill></a:ln><a:ln><a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill></a:ln></a:lnStyleLst>\
<a:effectStyleLst><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle></a:effectStyleLst>\
<a:bgFillStyleLst><a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill><a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill><a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill></a:bgFillStyleLst>\
</a:fmtScheme>\
</a:themeElements>\
</a:theme>";

fn slide(frame: &RetainedFrame, n: usize) -> String {
    let (x, y, cx, cy) = fit_image(frame.width, frame.height);
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<p:sld xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\" \
xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\" \
xmlns:p=\"http://schemas.openxmlformats.org/presentationml/2006/main\">\
<p:cSld><p:spTree>\
<p:nvGrpSpPr><p:cNvPr id=\"1\" name=\"\"/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>\
<p:grpSpPr/>\
<p:pic>\
<p:nvPicPr><p:cNvPr id=\"2\" name=\"Frame {n}\"/><p:cNvPicPr/><p:nvPr/></p:nvPicPr>\
<p:blipFill><a:blip r:embed=\"rId2\"/><a:stretch><a:fillRect/></a:stretch></p:blipFill>\
<p:spPr><a:xfrm><a:off x=\"{x}\" y=\"{y}\"/><a:ext cx=\"{cx}\" cy=\"{cy}\"/></a:xfrm>\
<a:prstGeom prst=\"rect\"><a:avLst/></a:prstGeom></p:spPr>\
</p:pic>\
</p:spTree></p:cSld>\
<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr>\
</p:sld>"
    )
}

fn slide_rels(n: usize) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout\" Target=\"../slideLayouts/slideLayout1.xml\"/>\
<Relationship Id=\"rId2\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/image\" Target=\"../media/image{n}.jpeg\"/>\
</Relationships>"
    )
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_frame(index: u64, width: u32, height: u32) -> RetainedFrame {
        RetainedFrame {
            index,
            timestamp_ms: index * 3000,
            width,
            height,
            jpeg: vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10],
        }
    }

    #[test]
    fn test_wide_image_fits_width() {
        // 32:9，比页面更宽 → 吃满宽度，垂直居中
        let (x, y, cx, cy) = fit_image(3200, 900);
        assert_eq!(x, 0);
        assert_eq!(cx, SLIDE_CX);
        assert!(cy < SLIDE_CY);
        assert_eq!(y, (SLIDE_CY - cy) / 2);
    }

    #[test]
    fn test_tall_image_fits_height() {
        let (x, y, cx, cy) = fit_image(900, 1600);
        assert_eq!(y, 0);
        assert_eq!(cy, SLIDE_CY);
        assert!(cx < SLIDE_CX);
        assert_eq!(x, (SLIDE_CX - cx) / 2);
    }

    #[test]
    fn test_exact_16_9_fills_slide() {
        let (x, y, cx, cy) = fit_image(1920, 1080);
        assert_eq!((x, y), (0, 0));
        assert_eq!((cx, cy), (SLIDE_CX, SLIDE_CY));
    }

    #[test]
    fn test_deck_is_a_readable_zip_with_expected_parts() {
        let frames = vec![test_frame(0, 1280, 720), test_frame(1, 1280, 720)];
        let data = write_deck(&frames, "Demo").unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(data)).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();

        assert!(names.contains(&"[Content_Types].xml".to_string()));
        assert!(names.contains(&"ppt/presentation.xml".to_string()));
        assert!(names.contains(&"ppt/slides/slide1.xml".to_string()));
        assert!(names.contains(&"ppt/slides/slide2.xml".to_string()));
        assert!(names.contains(&"ppt/media/image1.jpeg".to_string()));
        assert!(names.contains(&"ppt/media/image2.jpeg".to_string()));
        assert!(!names.contains(&"ppt/slides/slide3.xml".to_string()));
    }

    #[test]
    fn test_deck_bytes_are_deterministic() {
        let frames = vec![test_frame(0, 640, 360)];
        let a = write_deck(&frames, "Same").unwrap();
        let b = write_deck(&frames, "Same").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_title_is_escaped() {
        let frames = vec![test_frame(0, 640, 360)];
        let data = write_deck(&frames, "A < B & \"C\"").unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(data)).unwrap();
        let mut core = String::new();
        std::io::Read::read_to_string(
            &mut archive.by_name("docProps/core.xml").unwrap(),
            &mut core,
        )
        .unwrap();

        assert!(core.contains("A &lt; B &amp; &quot;C&quot;"));
    }
}
