// Askama template definitions

use askama::Template;

use crate::db::{Comment, Favorite};

// Favorite with its comments eagerly loaded for the list page
pub struct FavoriteWithComments {
    pub favorite: Favorite,
    pub comments: Vec<Comment>,
}

// Landing page
#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub user: Option<String>,
}

// Registration form
#[derive(Template)]
#[template(path = "register.html")]
pub struct RegisterTemplate {
    pub user: Option<String>,
}

// Login form
#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub user: Option<String>,
    pub message: Option<String>,
}

// Profile page
#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub user: Option<String>,
    pub email: String,
    pub member_since: String,
}

// Favorites list with comments
#[derive(Template)]
#[template(path = "favorites.html")]
pub struct FavoritesTemplate {
    pub user: Option<String>,
    pub favorites: Vec<FavoriteWithComments>,
}
