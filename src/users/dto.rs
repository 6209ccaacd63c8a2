use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FcmTokenRequest {
    #[serde(default)]
    pub fcm_token: String,
}
