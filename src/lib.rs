use std::io::Cursor;

use image::{DynamicImage, GenericImageView, ImageFormat, RgbaImage};
use js_sys::{Array, Object, Reflect, Uint8Array};
use palette::Srgb;
use wasm_bindgen::prelude::*;

mod blocks;
mod error;
mod pipeline;
mod raster;
mod reduce;
pub mod swatch;

pub use blocks::average_blocks;
pub use error::PixelateError;
pub use pipeline::{
    pixelate_raw, pixelate_raw_with, PixelateConfig, DEFAULT_BLOCK_SIZE, DEFAULT_MAX_COLORS,
};
pub use raster::{distance, rounded_mean, squared_distance, DistinctColors, Layout};
pub use reduce::{
    cluster_colors, reduce_palette, reduce_palette_with_mapping, Clusters, ColorMapping,
    MAX_ITERATIONS,
};

/// Output of [`pixelate_bytes`].
#[derive(Clone, Debug)]
pub struct Pixelated {
    /// PNG-encoded result.
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Visible colors of the result, sorted.
    pub palette: Vec<Srgb<u8>>,
}

impl Pixelated {
    /// The palette as `RRGGBB` strings.
    pub fn palette_hex(&self) -> Vec<String> {
        self.palette.iter().map(swatch::to_hex).collect()
    }
}

// ------------------------------------------------------------
// Codec boundary
// ------------------------------------------------------------

/// Decode `input`, pixelate it and re-encode the result as PNG.
///
/// Every input is processed as RGBA so transparency survives the round trip.
pub fn pixelate_bytes(input: &[u8], config: &PixelateConfig) -> Result<Pixelated, PixelateError> {
    config.validate()?;

    let img = image::load_from_memory(input).map_err(PixelateError::Decode)?;
    let (width, height) = img.dimensions();
    let raw = img.to_rgba8().into_raw();
    let layout = Layout::new(width as usize, height as usize, 4)?;

    let out = pixelate_raw(&raw, layout, config)?;
    let palette = swatch::palette_colors(&out, layout)?;

    let pixelated = DynamicImage::ImageRgba8(
        RgbaImage::from_raw(width, height, out)
            .ok_or(PixelateError::RebuildImage { width, height })?,
    );

    let mut png = Vec::new();
    pixelated
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(PixelateError::Encode)?;

    log::debug!(
        "pixelated {width}x{height} image: {} colors, {} bytes of PNG",
        palette.len(),
        png.len()
    );

    Ok(Pixelated {
        png,
        width,
        height,
        palette,
    })
}

/// Decode `input` and list its visible colors as `RRGGBB` strings.
pub fn extract_palette_bytes(input: &[u8]) -> Result<Vec<String>, PixelateError> {
    let img = image::load_from_memory(input).map_err(PixelateError::Decode)?;
    let (width, height) = img.dimensions();
    let raw = img.to_rgba8().into_raw();
    swatch::palette_hex(&raw, Layout::new(width as usize, height as usize, 4)?)
}

// ------------------------------------------------------------
// WebAssembly bindings
// ------------------------------------------------------------

fn js_error(e: PixelateError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn js_palette(palette: &[String]) -> Array {
    let palette_js = Array::new();
    for hex in palette {
        palette_js.push(&JsValue::from_str(hex));
    }
    palette_js
}

/// Pixelate an encoded image.
///
/// Steps performed:
/// 1. Decode the image and expand it to RGBA.
/// 2. Replace every `block_size × block_size` block with its mean color.
/// 3. If `smart_mode` is set, cluster the colors down to at most `max_colors`.
/// 4. Encode the result as PNG.
///
/// Returns `{ image: Uint8Array, palette: string[] }`, where `palette` lists
/// the visible colors of the result as `RRGGBB` strings.
#[wasm_bindgen]
pub fn pixelate(
    input: Vec<u8>,
    block_size: u32,
    smart_mode: bool,
    max_colors: u32,
    seed: Option<u32>,
) -> Result<Object, JsValue> {
    let config = PixelateConfig {
        block_size: block_size as usize,
        smart_mode,
        max_colors: max_colors as usize,
        seed: seed.map(u64::from),
    };
    let pixelated = pixelate_bytes(&input, &config).map_err(js_error)?;

    let result = Object::new();
    Reflect::set(
        &result,
        &JsValue::from_str("image"),
        &Uint8Array::from(pixelated.png.as_slice()),
    )?;
    Reflect::set(
        &result,
        &JsValue::from_str("palette"),
        &js_palette(&pixelated.palette_hex()),
    )?;

    Ok(result)
}

/// List the visible colors of an encoded image as `RRGGBB` strings.
#[wasm_bindgen]
pub fn extract_palette(input: Vec<u8>) -> Result<Array, JsValue> {
    let palette = extract_palette_bytes(&input).map_err(js_error)?;
    Ok(js_palette(&palette))
}
