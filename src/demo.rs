//! Offline stand-in for the remote model, selected when no API key is configured.
//!
//! Analysis returns a canned Spanish diagnosis; each generation waits a random
//! delay (so completions arrive out of order like the real API) and returns the
//! original photo tinted with the style's first palette color.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use image::{DynamicImage, Rgb};
use rand::Rng;
use tracing::info;

use crate::{
    encoder::{encode_png, EncodedImage},
    gemini::{AnalysisFailure, GenerationFailure, RedesignBrief, RedesignModel},
    models::{SpaceAnalysis, StyleSuggestion},
};

pub struct DemoModel {
    max_delay: Duration,
}

impl DemoModel {
    pub fn new(max_delay: Duration) -> Self {
        Self { max_delay }
    }

    fn random_delay(&self) -> Duration {
        let max = self.max_delay.as_millis() as u64;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max))
    }
}

const DEMO_STYLES: [(&str, &str, [&str; 3], &str, &str); 7] = [
    ("Nórdico", "Luz natural y materiales claros que amplían el espacio.", ["blanco", "roble", "gris claro"],
        "Lámparas de pie de luz cálida y cortinas de lino para difuminar la luz.", "Mantén el sofá y añade una alfombra de lana y mesas de madera clara."),
    ("Industrial", "Aprovecha la estructura con acabados crudos y metal.", ["negro", "óxido", "gris cemento"],
        "Bombillas vintage vistas y focos orientables sobre raíles.", "Sustituye la mesa de centro por una de hierro y madera recuperada."),
    ("Japandi", "Calma y orden combinando minimalismo japonés y escandinavo.", ["beige", "nogal", "verde salvia"],
        "Luz indirecta baja y lámparas de papel washi.", "Reduce piezas y elige muebles bajos de madera con líneas simples."),
    ("Mid-Century", "Formas orgánicas y madera cálida con un toque retro.", ["mostaza", "teca", "verde oliva"],
        "Lámparas tipo arco y apliques de latón.", "Incorpora un aparador de patas finas y un sillón tapizado."),
    ("Boho", "Texturas naturales y capas de textiles para un ambiente relajado.", ["terracota", "crema", "verde"],
        "Guirnaldas y pantallas de fibras naturales.", "Añade cojines de suelo, ratán y muchas plantas."),
    ("Mediterráneo", "Frescura y luminosidad inspiradas en la costa.", ["blanco roto", "azul cobalto", "arena"],
        "Maximiza la luz natural y suma lámparas de cerámica.", "Elige muebles de madera blanqueada y textiles de algodón."),
    ("Art Déco", "Elegancia geométrica y acabados brillantes.", ["verde esmeralda", "dorado", "negro"],
        "Lámparas de araña geométricas y apliques dorados.", "Introduce terciopelo y una mesa auxiliar con detalles metálicos."),
];

pub fn demo_analysis() -> SpaceAnalysis {
    SpaceAnalysis {
        current_style: "Contemporáneo neutro".to_string(),
        detected_furniture: vec!["sofá de tres plazas".into(), "mesa de centro".into(), "lámpara de pie".into()],
        pros: vec!["Buena entrada de luz natural".into(), "Distribución despejada".into(), "Paredes neutras versátiles".into()],
        cons: vec!["Falta de color".into(), "Iluminación artificial plana".into(), "Pocos textiles".into()],
        suggestions: DEMO_STYLES.iter().map(|(name, description, palette, lighting, furniture)| StyleSuggestion {
            name: name.to_string(),
            description: description.to_string(),
            color_palette: palette.iter().map(|c| c.to_string()).collect(),
            lighting_tips: lighting.to_string(),
            furniture_advice: furniture.to_string(),
            generated_image_url: None,
        }).collect(),
    }
}

fn tint_for(style_name: &str) -> Rgb<u8> {
    let hash = style_name.bytes().fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
    Rgb([(hash & 0xff) as u8, ((hash >> 8) & 0xff) as u8, ((hash >> 16) & 0xff) as u8])
}

pub fn render_placeholder(image: &EncodedImage, style_name: &str) -> Result<String, GenerationFailure> {
    let bytes = image.decode().map_err(|e| GenerationFailure::Render(e.to_string()))?;
    let original = image::load_from_memory(&bytes).map_err(|e| GenerationFailure::Render(e.to_string()))?;
    let mut canvas = original.thumbnail(512, 512).to_rgb8();
    let Rgb(tint) = tint_for(style_name);
    for pixel in canvas.pixels_mut() {
        for (channel, t) in pixel.0.iter_mut().zip(tint) {
            *channel = ((*channel as u16 * 65 + t as u16 * 35) / 100) as u8;
        }
    }
    let png = encode_png(&DynamicImage::ImageRgb8(canvas)).map_err(|e| GenerationFailure::Render(e.to_string()))?;
    let data = base64::engine::general_purpose::STANDARD.encode(png);
    Ok(EncodedImage { mime_type: "image/png".to_string(), data }.to_data_uri())
}

#[async_trait]
impl RedesignModel for DemoModel {
    fn name(&self) -> &str { "demo" }

    async fn analyze_space(&self, _image: &EncodedImage) -> Result<SpaceAnalysis, AnalysisFailure> {
        info!("Using demo mode - returning canned analysis");
        Ok(demo_analysis())
    }

    async fn generate_redesign(&self, image: &EncodedImage, brief: &RedesignBrief) -> Result<String, GenerationFailure> {
        let delay = self.random_delay();
        tokio::time::sleep(delay).await;
        info!("📦 Demo redesign '{}' after {:?}", brief.style_name, delay);
        render_placeholder(image, &brief.style_name)
    }
}
