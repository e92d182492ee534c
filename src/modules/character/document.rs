use serde::{Deserialize, Deserializer, Serialize, de::Error as _};
use serde_json::{Map, Value};

pub const PROFILE_PREFIX: &str = "profile";
pub const CONTENT_PREFIX: &str = "content";
pub const STATIC_URL_PREFIX: &str = "/static";

/// Ordered blocks of a character page.
///
/// Accepts either a single block object or an array of blocks; always
/// serializes as an array. Keys the block types do not name are kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CharacterDocument {
    pub blocks: Vec<Block>,
}

impl<'de> Deserialize<'de> for CharacterDocument {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let blocks = if value.is_array() {
            Vec::<Block>::deserialize(value).map_err(D::Error::custom)?
        } else {
            vec![Block::deserialize(value).map_err(D::Error::custom)?]
        };
        Ok(Self { blocks })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Block {
    Profile(ProfileBlock),
    Content(ContentBlock),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileBlock {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub portrait_img: String,
    #[serde(default)]
    pub basic_info: Vec<BasicInfo>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicInfo {
    pub label: String,
    pub value: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: Vec<ContentItem>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    P,
    H2,
    H3,
    Img,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    #[serde(rename = "type")]
    pub kind: ContentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CharacterDocument {
    /// Points image slots at the uploaded files that claim them.
    ///
    /// A profile block at index `i` takes the first name starting with
    /// `profile_{i}_`; an image item `j` of a content block `i` takes the first
    /// name starting with `content_{i}_{j}_`. Slots without a match are left
    /// untouched.
    pub fn attach_uploaded_images(&mut self, image_names: &[&str]) {
        for (block_index, block) in self.blocks.iter_mut().enumerate() {
            match block {
                Block::Profile(profile) => {
                    let prefix = format!("{PROFILE_PREFIX}_{block_index}_");
                    if let Some(name) = first_with_prefix(image_names, &prefix) {
                        profile.portrait_img = static_url(name);
                    }
                }
                Block::Content(content) => {
                    for (item_index, item) in content.content.iter_mut().enumerate() {
                        if item.kind != ContentKind::Img {
                            continue;
                        }
                        let prefix = format!("{CONTENT_PREFIX}_{block_index}_{item_index}_");
                        if let Some(name) = first_with_prefix(image_names, &prefix) {
                            item.src = Some(static_url(name));
                        }
                    }
                }
            }
        }
    }
}

fn first_with_prefix<'a>(names: &[&'a str], prefix: &str) -> Option<&'a str> {
    names.iter().copied().find(|name| name.starts_with(prefix))
}

fn static_url(name: &str) -> String {
    format!("{STATIC_URL_PREFIX}/{name}")
}
