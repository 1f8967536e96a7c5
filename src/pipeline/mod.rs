// Fragment data: the pad grid, its sounds, and how it's stored.
pub mod catalog;
pub mod colors;
pub mod fragment;
pub mod grid;
pub mod persistence;
pub mod sound;
