//! # Output Module
//!
//! Ways to get a G-buffer snapshot out of the process:
//! - Live progressive display in TEV (The EXR Viewer)
//! - PNG export of the normals, encoded as `n * 0.5 + 0.5`
//! - OpenEXR export of positions and normals at full precision
//!
//! Failures are logged, never fatal: the render keeps going without its
//! output rather than aborting a long session.

use std::net::TcpStream;
use std::path::Path;

use exr::prelude::*;
use glam::Vec4;
use image::{ImageBuffer, Rgb};
use log::{debug, info, warn};
use rayon::prelude::*;
use tev_client::{PacketCreateImage, PacketUpdateImage, TevClient};

use crate::gbuffer::GBufferSnapshot;

/// Port TEV listens on when the address does not name one.
pub const DEFAULT_TEV_PORT: u16 = 14158;

/// Append the default TEV port unless `address` already has one.
pub fn tev_address_with_port(address: &str) -> String {
    if address.contains(':') {
        address.to_string()
    } else {
        format!("{address}:{DEFAULT_TEV_PORT}")
    }
}

/// Map a normal from `[-1, 1]` to an 8-bit color. Empty texels stay black.
fn encode_normal(normal: Vec4) -> Rgb<u8> {
    if normal == Vec4::ZERO {
        return Rgb([0, 0, 0]);
    }
    let encode = |component: f32| ((component * 0.5 + 0.5).clamp(0.0, 1.0) * 255.0).round() as u8;
    Rgb([encode(normal.x), encode(normal.y), encode(normal.z)])
}

/// Normals as an 8-bit RGB image, converted in parallel.
pub fn normals_to_image(snapshot: &GBufferSnapshot) -> ImageBuffer<Rgb<u8>, Vec<u8>> {
    let mut image: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::new(snapshot.width, snapshot.height);
    image
        .enumerate_pixels_mut()
        .par_bridge()
        .for_each(|(x, y, pixel)| *pixel = encode_normal(snapshot.normal(x, y)));
    image
}

/// Save the normals as a PNG (or any format `image` infers from the extension).
pub fn save_normals_png(snapshot: &GBufferSnapshot, output_path: &Path) {
    match normals_to_image(snapshot).save(output_path) {
        Ok(_) => info!("Normals saved as {}", output_path.display()),
        Err(e) => warn!("Failed to save normals image: {}", e),
    }
}

fn save_texels_exr(texels: &[Vec4], width: u32, output_path: &Path, what: &str) {
    let height = texels.len() / width.max(1) as usize;
    let result = write_rgba_file(output_path, width as usize, height, |x, y| {
        let texel = texels[y * width as usize + x];
        (texel.x, texel.y, texel.z, texel.w)
    });
    match result {
        Ok(_) => info!("{} saved as EXR: {}", what, output_path.display()),
        Err(e) => warn!("Failed to save {} EXR: {}", what, e),
    }
}

/// Save hit positions as RGBA32F EXR; alpha is 1 where a sphere was hit.
pub fn save_positions_exr(snapshot: &GBufferSnapshot, output_path: &Path) {
    save_texels_exr(&snapshot.positions, snapshot.width, output_path, "Positions");
}

/// Save normals as RGBA32F EXR.
pub fn save_normals_exr(snapshot: &GBufferSnapshot, output_path: &Path) {
    save_texels_exr(&snapshot.normals, snapshot.width, output_path, "Normals");
}

/// Write the snapshot next to `output_path`: `.exr` gets `<stem>.position.exr`
/// and `<stem>.normal.exr`, anything else gets the normals image.
pub fn save_gbuffer(snapshot: &GBufferSnapshot, output_path: &Path) {
    let is_exr = output_path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("exr"));
    if is_exr {
        save_positions_exr(snapshot, &output_path.with_extension("position.exr"));
        save_normals_exr(snapshot, &output_path.with_extension("normal.exr"));
    } else {
        save_normals_png(snapshot, output_path);
    }
}

const TEV_IMAGE: &str = "sphereflake";
const TEV_CHANNELS: [&str; 6] = [
    "normal.R",
    "normal.G",
    "normal.B",
    "position.R",
    "position.G",
    "position.B",
];

/// A live connection to TEV showing the G-buffer as two layers.
pub struct TevDisplay {
    client: TevClient,
    address: String,
    size: Option<(u32, u32)>,
}

impl TevDisplay {
    /// Connect to TEV at `address` (IP:port, or IP for the default port).
    pub fn connect(address: &str) -> std::io::Result<Self> {
        let address = tev_address_with_port(address);
        debug!("Attempting to connect to TEV at {}", address);
        let stream = TcpStream::connect(&address)?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY: {}", e);
        }
        info!("Connected to TEV at {}", address);
        Ok(Self {
            client: TevClient::wrap(stream),
            address,
            size: None,
        })
    }

    /// Address the display is connected to.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Upload the snapshot, creating (or recreating after a resize) the image.
    ///
    /// Texels go out as-is: each layer is the interleaved RGBA array with a
    /// stride of four floats, so no planar copy is made.
    pub fn update(&mut self, snapshot: &GBufferSnapshot) -> std::io::Result<()> {
        let size = (snapshot.width, snapshot.height);
        if self.size != Some(size) {
            self.client.send(PacketCreateImage {
                image_name: TEV_IMAGE,
                grab_focus: self.size.is_none(),
                width: snapshot.width,
                height: snapshot.height,
                channel_names: &TEV_CHANNELS,
            })?;
            self.size = Some(size);
            debug!("Image created in TEV: {}x{}", size.0, size.1);
        }

        let start = std::time::Instant::now();
        let layers: [(&[&str], &[Vec4]); 2] = [
            (&TEV_CHANNELS[..3], snapshot.normals.as_slice()),
            (&TEV_CHANNELS[3..], snapshot.positions.as_slice()),
        ];
        for (channel_names, texels) in layers {
            self.client.send(PacketUpdateImage {
                image_name: TEV_IMAGE,
                grab_focus: false,
                channel_names,
                channel_offsets: &[0, 1, 2],
                channel_strides: &[4, 4, 4],
                x: 0,
                y: 0,
                width: snapshot.width,
                height: snapshot.height,
                data: bytemuck::cast_slice(texels),
            })?;
        }
        debug!("G-buffer sent to TEV in {:.2?}", start.elapsed());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> GBufferSnapshot {
        GBufferSnapshot {
            width: 2,
            height: 1,
            positions: vec![Vec4::new(0.0, 0.0, 1.0, 1.0), Vec4::ZERO],
            normals: vec![Vec4::new(0.0, 0.0, 1.0, 0.0), Vec4::ZERO],
        }
    }

    #[test]
    fn default_port_is_appended() {
        assert_eq!(tev_address_with_port("127.0.0.1"), "127.0.0.1:14158");
        assert_eq!(tev_address_with_port("host:9000"), "host:9000");
    }

    #[test]
    fn normals_are_encoded_to_unsigned_colors() {
        let image = normals_to_image(&snapshot());
        assert_eq!(image.dimensions(), (2, 1));
        assert_eq!(*image.get_pixel(0, 0), Rgb([128, 128, 255]));
        assert_eq!(*image.get_pixel(1, 0), Rgb([0, 0, 0]));
    }

    #[test]
    fn gbuffer_files_are_written() {
        let dir = std::env::temp_dir().join(format!("sphereflake-output-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        save_gbuffer(&snapshot(), &dir.join("frame.exr"));
        assert!(dir.join("frame.position.exr").exists());
        assert!(dir.join("frame.normal.exr").exists());

        save_gbuffer(&snapshot(), &dir.join("frame.png"));
        let reloaded = image::open(dir.join("frame.png")).unwrap().to_rgb8();
        assert_eq!(*reloaded.get_pixel(0, 0), Rgb([128, 128, 255]));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
