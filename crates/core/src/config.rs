//! Conversation configuration passed to the backend when a session starts.
//!
//! The structure mirrors the avatar backend's start request so it can be
//! serialized as-is; the backend is the only party that validates it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AvatarQuality {
    Low,
    Medium,
    #[default]
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceEmotion {
    Excited,
    Serious,
    Friendly,
    Soothing,
    Broadcaster,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceModel {
    ElevenFlashV2_5,
    ElevenMultilingualV2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceChatTransport {
    Websocket,
    #[default]
    Livekit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SttProvider {
    #[default]
    Deepgram,
    Gladia,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VideoEncoding {
    #[default]
    H264,
    VP8,
}

/// Voice parameters for the avatar's speech.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceSetting {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotion: Option<VoiceEmotion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<VoiceModel>,
}

/// Speech recognition settings for the user's audio input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SttSettings {
    pub provider: SttProvider,
    pub confidence: f64,
}

impl Default for SttSettings {
    fn default() -> Self {
        Self {
            provider: SttProvider::Deepgram,
            confidence: 0.8,
        }
    }
}

/// Per-session configuration; never mutated while a session is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationConfig {
    pub quality: AvatarQuality,
    pub avatar_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub knowledge_id: Option<String>,
    pub voice: VoiceSetting,
    pub version: String,
    #[serde(rename = "video_encoding")]
    pub video_encoding: VideoEncoding,
    pub language: String,
    pub disable_idle_timeout: bool,
    pub voice_chat_transport: VoiceChatTransport,
    pub stt_settings: SttSettings,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            quality: AvatarQuality::High,
            avatar_name: "June_HR_public".to_string(),
            knowledge_id: Some("072e7c65ff9e4762ad63bfe1f34d9440".to_string()),
            voice: VoiceSetting {
                voice_id: Some("35c481f56a20457b98409dd72e5bc478".to_string()),
                ..Default::default()
            },
            version: "v2".to_string(),
            video_encoding: VideoEncoding::H264,
            language: "ru".to_string(),
            disable_idle_timeout: true,
            voice_chat_transport: VoiceChatTransport::Livekit,
            stt_settings: SttSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_config_wire_format() {
        let value = serde_json::to_value(ConversationConfig::default()).unwrap();
        assert_eq!(
            value,
            json!({
                "quality": "high",
                "avatarName": "June_HR_public",
                "knowledgeId": "072e7c65ff9e4762ad63bfe1f34d9440",
                "voice": { "voiceId": "35c481f56a20457b98409dd72e5bc478" },
                "version": "v2",
                "video_encoding": "H264",
                "language": "ru",
                "disableIdleTimeout": true,
                "voiceChatTransport": "livekit",
                "sttSettings": { "provider": "deepgram", "confidence": 0.8 }
            })
        );
    }

    #[test]
    fn test_voice_setting_serializes_optional_fields() {
        let voice = VoiceSetting {
            voice_id: None,
            rate: Some(1.5),
            emotion: Some(VoiceEmotion::Friendly),
            model: Some(VoiceModel::ElevenFlashV2_5),
        };
        assert_eq!(
            serde_json::to_value(voice).unwrap(),
            json!({ "rate": 1.5, "emotion": "friendly", "model": "eleven_flash_v2_5" })
        );
    }

    #[test]
    fn test_config_deserializes_from_camel_case() {
        let config: ConversationConfig = serde_json::from_value(json!({
            "quality": "low",
            "avatarName": "Ann_Therapist_public",
            "voice": {},
            "version": "v2",
            "video_encoding": "VP8",
            "language": "en",
            "disableIdleTimeout": false,
            "voiceChatTransport": "websocket",
            "sttSettings": { "provider": "gladia", "confidence": 0.55 }
        }))
        .unwrap();
        assert_eq!(config.quality, AvatarQuality::Low);
        assert_eq!(config.knowledge_id, None);
        assert_eq!(config.video_encoding, VideoEncoding::VP8);
        assert_eq!(config.voice_chat_transport, VoiceChatTransport::Websocket);
        assert_eq!(config.stt_settings.provider, SttProvider::Gladia);
    }
}
