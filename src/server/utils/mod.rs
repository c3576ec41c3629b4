pub mod origin_utils;
