//! Binds the downloaded pages of a chapter into one PDF.
//!
//! Each image gets its own page of the configured format, scaled to fit
//! while keeping its aspect ratio and centred on both axes.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::{ImageFormat, ImageReader};
use log::{debug, info};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use crate::configuration::{PageFormat, Settings};
use crate::error::AssemblyError;

/// The written document of one chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledDocument {
    pub path: PathBuf,
    pub page_count: usize,
}

/// Where an image lands on its page, in PDF points from the bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Scales `image` (width, height) to fill one axis of `page` and centres it.
pub fn fit_centered(image: (u32, u32), page: (f64, f64)) -> Placement {
    let (page_width, page_height) = page;
    let image_ratio = f64::from(image.0) / f64::from(image.1);
    let page_ratio = page_width / page_height;

    let (width, height) = if image_ratio > page_ratio {
        (page_width, page_width / image_ratio)
    } else {
        (page_height * image_ratio, page_height)
    };

    Placement {
        x: (page_width - width) / 2.0,
        y: (page_height - height) / 2.0,
        width,
        height,
    }
}

pub struct Assembler {
    page_format: PageFormat,
    extensions: Vec<String>,
}

impl Assembler {
    pub fn new(settings: &Settings) -> Self {
        Assembler {
            page_format: settings.page_format,
            extensions: settings.image_extensions.clone(),
        }
    }

    /// Output path for a chapter directory: `<dir>/<dir name>.pdf`.
    pub fn output_path(chapter_dir: &Path) -> PathBuf {
        let name = chapter_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "chapter".into());
        chapter_dir.join(format!("{}.pdf", name))
    }

    /// Image files of `chapter_dir` ordered by the page index in their name.
    ///
    /// Files whose stem is not a number were not written by the downloader
    /// and are ignored. Two files claiming the same index (`0.png` and
    /// `0.webp`) make the page order ambiguous and are rejected.
    pub fn page_files(&self, chapter_dir: &Path) -> Result<Vec<PathBuf>, AssemblyError> {
        let read_dir_err = |source| AssemblyError::ReadDir {
            path: chapter_dir.to_path_buf(),
            source,
        };

        let mut pages = Vec::new();
        for entry in fs::read_dir(chapter_dir).map_err(read_dir_err)? {
            let path = entry.map_err(read_dir_err)?.path();
            if !path.is_file() {
                continue;
            }
            let is_image = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| self.extensions.iter().any(|a| a.eq_ignore_ascii_case(e)))
                .unwrap_or(false);
            let index = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<usize>().ok());
            match index {
                Some(index) if is_image => pages.push((index, path)),
                _ => debug!("Ignoring {}", path.display()),
            }
        }

        pages.sort();
        if let Some(pair) = pages.windows(2).find(|pair| pair[0].0 == pair[1].0) {
            return Err(AssemblyError::DuplicatePage {
                index: pair[0].0,
                first: pair[0].1.clone(),
                second: pair[1].1.clone(),
            });
        }
        Ok(pages.into_iter().map(|(_, path)| path).collect())
    }

    /// Builds `<chapter_dir>/<dir name>.pdf` from every page file in the directory.
    pub fn assemble(&self, chapter_dir: &Path) -> Result<AssembledDocument, AssemblyError> {
        let pages = self.page_files(chapter_dir)?;
        if pages.is_empty() {
            return Err(AssemblyError::NoImages {
                path: chapter_dir.to_path_buf(),
            });
        }
        self.assemble_files(&pages, &Self::output_path(chapter_dir))
    }

    /// Writes `pages` to `output`, one page per image, in the given order.
    ///
    /// Any unreadable image aborts the whole document.
    pub fn assemble_files(
        &self,
        pages: &[PathBuf],
        output: &Path,
    ) -> Result<AssembledDocument, AssemblyError> {
        if pages.is_empty() {
            return Err(AssemblyError::NoImages {
                path: output.to_path_buf(),
            });
        }

        let page_size = self.page_format.dimensions();
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids: Vec<Object> = Vec::with_capacity(pages.len());

        for path in pages {
            let dimensions = read_dimensions(path)?;
            let placement = fit_centered(dimensions, page_size);
            let image_id = doc.add_object(image_stream(path)?);
            kids.push(add_page(&mut doc, pages_id, page_size, image_id, placement)?.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        doc.save(output).map_err(|source| AssemblyError::Write {
            path: output.to_path_buf(),
            source,
        })?;
        info!("Wrote {} ({} pages)", output.display(), pages.len());

        Ok(AssembledDocument {
            path: output.to_path_buf(),
            page_count: pages.len(),
        })
    }
}

/// Width and height from the image header, without decoding pixels.
fn read_dimensions(path: &Path) -> Result<(u32, u32), AssemblyError> {
    let (width, height) = ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|source| AssemblyError::Io {
            path: path.to_path_buf(),
            source,
        })?
        .into_dimensions()
        .map_err(|source| AssemblyError::Image {
            path: path.to_path_buf(),
            source,
        })?;

    if width == 0 || height == 0 {
        return Err(AssemblyError::EmptyImage {
            path: path.to_path_buf(),
        });
    }
    Ok((width, height))
}

/// JPEG bytes go in untouched, labelled with the colour space of their
/// frame header. Everything else is decoded to RGB and deflated.
fn image_stream(path: &Path) -> Result<Stream, AssemblyError> {
    let io_err = |source| AssemblyError::Io {
        path: path.to_path_buf(),
        source,
    };
    let image_err = |source| AssemblyError::Image {
        path: path.to_path_buf(),
        source,
    };

    let bytes = fs::read(path).map_err(io_err)?;
    let format = image::guess_format(&bytes).map_err(image_err)?;

    if format == ImageFormat::Jpeg {
        let header = JpegHeader::parse(&bytes).ok_or_else(|| AssemblyError::BadJpeg {
            path: path.to_path_buf(),
        })?;
        let color_space = match header.components {
            1 => "DeviceGray",
            4 => "DeviceCMYK",
            _ => "DeviceRGB",
        };
        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(header.width),
            "Height" => i64::from(header.height),
            "ColorSpace" => color_space,
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        };
        // Adobe writes CMYK inverted
        if header.components == 4 && header.adobe {
            let decode: Vec<Object> = [1_i64, 0, 1, 0, 1, 0, 1, 0]
                .into_iter()
                .map(Object::Integer)
                .collect();
            dict.set("Decode", decode);
        }
        return Ok(Stream::new(dict, bytes).with_compression(false));
    }

    let rgb = image::load_from_memory_with_format(&bytes, format)
        .map_err(image_err)?
        .to_rgb8();
    let (width, height) = rgb.dimensions();
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(rgb.as_raw()).map_err(io_err)?;
    let data = encoder.finish().map_err(io_err)?;

    let dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => i64::from(width),
        "Height" => i64::from(height),
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
        "Filter" => "FlateDecode",
    };
    Ok(Stream::new(dict, data).with_compression(false))
}

/// Frame parameters from a JPEG's start-of-frame segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct JpegHeader {
    width: u32,
    height: u32,
    components: u8,
    /// An APP14 "Adobe" segment precedes the frame
    adobe: bool,
}

impl JpegHeader {
    /// Walks the marker segments up to the first SOFn. `None` if the data
    /// ends or turns malformed before one.
    fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.get(..2)? != [0xFF, 0xD8] {
            return None;
        }
        let mut adobe = false;
        let mut i = 2;
        loop {
            if *bytes.get(i)? != 0xFF {
                return None;
            }
            while *bytes.get(i)? == 0xFF {
                i += 1;
            }
            let marker = *bytes.get(i)?;
            i += 1;
            if matches!(marker, 0x01 | 0xD0..=0xD7) {
                continue;
            }
            if matches!(marker, 0xD9 | 0xDA) {
                return None;
            }
            let len = usize::from(u16::from_be_bytes([*bytes.get(i)?, *bytes.get(i + 1)?]));
            let segment = bytes.get(i + 2..i + len)?;
            match marker {
                0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                    return Some(JpegHeader {
                        height: u32::from(u16::from_be_bytes([*segment.get(1)?, *segment.get(2)?])),
                        width: u32::from(u16::from_be_bytes([*segment.get(3)?, *segment.get(4)?])),
                        components: *segment.get(5)?,
                        adobe,
                    });
                }
                0xEE if segment.starts_with(b"Adobe") => adobe = true,
                _ => {}
            }
            i += len;
        }
    }
}

fn add_page(
    doc: &mut Document,
    pages_id: ObjectId,
    (page_width, page_height): (f64, f64),
    image_id: ObjectId,
    placement: Placement,
) -> Result<ObjectId, AssemblyError> {
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    real(placement.width),
                    0.into(),
                    0.into(),
                    real(placement.height),
                    real(placement.x),
                    real(placement.y),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

    Ok(doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), real(page_width), real(page_height)],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! {
                "Im0" => image_id,
            },
        },
    }))
}

fn real(value: f64) -> Object {
    Object::Real(value as _)
}
