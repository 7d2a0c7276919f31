mod analytics;
mod climate;
mod helpers;
