//! Assistant personas.
//!
//! Every chat surface runs the same controller; what differs between them is
//! the system instructions. Each preset is a complete [`AssistantProfile`].

use shared::settings::{ChatSettings, ProfileKind};

/// Caption used when the user sends an image without any text.
pub const DEFAULT_IMAGE_CAPTION: &str = "Bu görselde ne görüyorsun?";

/// Assistant turn shown whenever a completion request fails.
pub const FALLBACK_MESSAGE: &str = "Üzgünüm, bir hata oluştu. Lütfen tekrar deneyin.";

const OFFICE_INSTRUCTIONS: &str = r#"Sen LC Waikiki OneSearch asistanısın. LC Waikiki ofisinde çalışan personele yardım ediyorsun.

GÖREVIN:
• LC Waikiki çalışanlarına günlük iş süreçlerinde destek olmak
• Ürün takibi konularında yardım etmek
• Dosya takibi ve organizasyon konularında rehberlik etmek
• İş süreçleri hakkında bilgi vermek
• Genel ofis ve iş ile ilgili soruları yanıtlamak

YANIT STİLİN:
• Profesyonel ve yardımsever ol
• Türkçe yanıt ver
• Kısa ve net açıklamalar yap
• İş odaklı çözümler sun
• Samimi ama profesyonel bir ton kullan

KARŞILAMA:
• Kullanıcı "merhaba" veya benzeri selamlama yaptığında: "LC Waikiki - One Search'e hoşgeldin. Sana bugün nasıl yardımcı olabilirim?" diye karşıla

VEDA:
• Konuşma bittiğinde veya kullanıcı teşekkür ettiğinde "İyi çalışmalar!" diye bitir

Sen LC Waikiki ofis personelinin günlük iş süreçlerinde yanında olan asistanısın."#;

const SEARCH_INSTRUCTIONS: &str = "Sen LC Waikiki OneSearch'ün AI asistanısın. Kullanıcılara ürün arama, moda önerileri ve alışveriş konularında yardım ediyorsun. Türkçe yanıt ver ve kısa, net cevaplar ver.";

const API_INSTRUCTIONS: &str = "Sen yardımcı bir AI asistanısın. Türkçe yanıt ver ve kullanıcıya nazik bir şekilde yardım et. LCW OneSearch uygulamasının bir parçasısın.";

/// Get the fixed system instructions for a persona
pub fn get_system_instructions(kind: ProfileKind) -> &'static str {
    match kind {
        ProfileKind::Office => OFFICE_INSTRUCTIONS,
        ProfileKind::Search => SEARCH_INSTRUCTIONS,
        ProfileKind::Api => API_INSTRUCTIONS,
    }
}

/// Everything persona-specific a conversation needs. Constant for the
/// lifetime of a controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssistantProfile {
    pub system_instructions: String,
    pub default_caption: String,
    pub fallback_message: String,
}

impl AssistantProfile {
    pub fn preset(kind: ProfileKind) -> Self {
        Self::custom(get_system_instructions(kind))
    }

    /// Profile with custom instructions and the stock caption/fallback.
    pub fn custom(system_instructions: impl Into<String>) -> Self {
        Self {
            system_instructions: system_instructions.into(),
            default_caption: DEFAULT_IMAGE_CAPTION.to_string(),
            fallback_message: FALLBACK_MESSAGE.to_string(),
        }
    }

    /// Preset for the configured persona, with any non-blank text overrides
    /// from the settings applied.
    pub fn from_settings(settings: &ChatSettings) -> Self {
        let mut profile = Self::preset(settings.profile);
        if let Some(caption) = non_blank(&settings.default_caption) {
            profile = profile.with_default_caption(caption);
        }
        if let Some(message) = non_blank(&settings.fallback_message) {
            profile = profile.with_fallback_message(message);
        }
        profile
    }

    pub fn with_default_caption(mut self, caption: impl Into<String>) -> Self {
        self.default_caption = caption.into();
        self
    }

    pub fn with_fallback_message(mut self, message: impl Into<String>) -> Self {
        self.fallback_message = message.into();
        self
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}
