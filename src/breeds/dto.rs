use serde::{Deserialize, Serialize};

/// Breed as returned by TheCatAPI. Only the fields the API exposes to
/// clients are deserialized; everything else in the upstream payload is
/// ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiBreed {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub temperament: Option<String>,
    pub origin: Option<String>,
    pub life_span: Option<String>,
    pub wikipedia_url: Option<String>,
    pub reference_image_id: Option<String>,
    pub image: Option<ApiBreedImage>,
    pub adaptability: Option<i32>,
    pub affection_level: Option<i32>,
    pub child_friendly: Option<i32>,
    pub dog_friendly: Option<i32>,
    pub energy_level: Option<i32>,
    pub grooming: Option<i32>,
    pub health_issues: Option<i32>,
    pub intelligence: Option<i32>,
    pub shedding_level: Option<i32>,
    pub social_needs: Option<i32>,
    pub stranger_friendly: Option<i32>,
    pub vocalisation: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiBreedImage {
    pub url: Option<String>,
}

/// Flattened breed returned by this API.
#[derive(Debug, Clone, Serialize)]
pub struct BreedResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub temperament: Option<String>,
    pub origin: Option<String>,
    pub life_span: Option<String>,
    pub wikipedia_url: Option<String>,
    pub image_url: Option<String>,
    pub adaptability: Option<i32>,
    pub affection_level: Option<i32>,
    pub child_friendly: Option<i32>,
    pub dog_friendly: Option<i32>,
    pub energy_level: Option<i32>,
    pub grooming: Option<i32>,
    pub health_issues: Option<i32>,
    pub intelligence: Option<i32>,
    pub shedding_level: Option<i32>,
    pub social_needs: Option<i32>,
    pub stranger_friendly: Option<i32>,
    pub vocalisation: Option<i32>,
}

impl From<ApiBreed> for BreedResponse {
    fn from(breed: ApiBreed) -> Self {
        // Prefer the attached image; fall back to the CDN URL derived from
        // the reference image id.
        let image_url = breed
            .image
            .and_then(|img| img.url)
            .or_else(|| {
                breed
                    .reference_image_id
                    .as_ref()
                    .map(|id| format!("https://cdn2.thecatapi.com/images/{id}.jpg"))
            });

        Self {
            id: breed.id,
            name: breed.name,
            description: breed.description,
            temperament: breed.temperament,
            origin: breed.origin,
            life_span: breed.life_span,
            wikipedia_url: breed.wikipedia_url,
            image_url,
            adaptability: breed.adaptability,
            affection_level: breed.affection_level,
            child_friendly: breed.child_friendly,
            dog_friendly: breed.dog_friendly,
            energy_level: breed.energy_level,
            grooming: breed.grooming,
            health_issues: breed.health_issues,
            intelligence: breed.intelligence,
            shedding_level: breed.shedding_level,
            social_needs: breed.social_needs,
            stranger_friendly: breed.stranger_friendly,
            vocalisation: breed.vocalisation,
        }
    }
}

/// Query parameters for `/breeds/search`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BreedSearchParams {
    pub q: Option<String>,
    pub limit: Option<u32>,
    pub attach_breed: Option<u8>,
}
