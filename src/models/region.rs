//! Regulatory jurisdictions that publish enforcement listings.
//!
//! Each region has a display name (as it appears in the `区域` column of
//! stored tables), a site code used in listing URLs and filenames, and the
//! province it belongs to.

use serde::{Deserialize, Serialize};

/// A jurisdiction with its own enforcement listing site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    Beijing,
    Xiamen,
    Qinghai,
    Gansu,
    Tianjin,
    Hebei,
    Guizhou,
    Hunan,
    Shenzhen,
    Jiangxi,
    Guangdong,
    Chongqing,
    Heilongjiang,
    Fujian,
    Henan,
    Shaanxi,
    Hainan,
    Yunnan,
    Hubei,
    Shandong,
    Xinjiang,
    Ningbo,
    Dalian,
    Jiangsu,
    Neimenggu,
    Zhejiang,
    Jilin,
    Guangxi,
    Shanghai,
    Ningxia,
    Anhui,
    Shanxi,
    Qingdao,
    Liaoning,
    Xizang,
    Sichuan,
    Headquarters,
}

struct RegionInfo {
    region: Region,
    name: &'static str,
    code: &'static str,
    province: &'static str,
}

const REGIONS: &[RegionInfo] = &[
    RegionInfo { region: Region::Beijing, name: "北京", code: "beijing", province: "北京市" },
    RegionInfo { region: Region::Xiamen, name: "厦门", code: "xiamen", province: "福建省" },
    RegionInfo { region: Region::Qinghai, name: "青海", code: "qinghai", province: "青海省" },
    RegionInfo { region: Region::Gansu, name: "甘肃", code: "gansu", province: "甘肃省" },
    RegionInfo { region: Region::Tianjin, name: "天津", code: "tianjin", province: "天津市" },
    RegionInfo { region: Region::Hebei, name: "河北", code: "hebei", province: "河北省" },
    RegionInfo { region: Region::Guizhou, name: "贵州", code: "guizhou", province: "贵州省" },
    RegionInfo { region: Region::Hunan, name: "湖南", code: "hunan", province: "湖南省" },
    RegionInfo { region: Region::Shenzhen, name: "深圳", code: "shenzhen", province: "广东省" },
    RegionInfo { region: Region::Jiangxi, name: "江西", code: "jiangxi", province: "江西省" },
    RegionInfo { region: Region::Guangdong, name: "广东", code: "guangdong", province: "广东省" },
    RegionInfo { region: Region::Chongqing, name: "重庆", code: "chongqing", province: "重庆市" },
    RegionInfo { region: Region::Heilongjiang, name: "黑龙江", code: "heilongjiang", province: "黑龙江省" },
    RegionInfo { region: Region::Fujian, name: "福建", code: "fujian", province: "福建省" },
    RegionInfo { region: Region::Henan, name: "河南", code: "henan", province: "河南省" },
    RegionInfo { region: Region::Shaanxi, name: "陕西", code: "shaanxi", province: "陕西省" },
    RegionInfo { region: Region::Hainan, name: "海南", code: "hainan", province: "海南省" },
    RegionInfo { region: Region::Yunnan, name: "云南", code: "yunnan", province: "云南省" },
    RegionInfo { region: Region::Hubei, name: "湖北", code: "hubei", province: "湖北省" },
    RegionInfo { region: Region::Shandong, name: "山东", code: "shandong", province: "山东省" },
    RegionInfo { region: Region::Xinjiang, name: "新疆", code: "xinjiang", province: "新疆维吾尔自治区" },
    RegionInfo { region: Region::Ningbo, name: "宁波", code: "ningbo", province: "浙江省" },
    RegionInfo { region: Region::Dalian, name: "大连", code: "dalian", province: "辽宁省" },
    RegionInfo { region: Region::Jiangsu, name: "江苏", code: "jiangsu", province: "江苏省" },
    RegionInfo { region: Region::Neimenggu, name: "内蒙古", code: "neimenggu", province: "内蒙古自治区" },
    RegionInfo { region: Region::Zhejiang, name: "浙江", code: "zhejiang", province: "浙江省" },
    RegionInfo { region: Region::Jilin, name: "吉林", code: "jilin", province: "吉林省" },
    RegionInfo { region: Region::Guangxi, name: "广西", code: "guangxi", province: "广西壮族自治区" },
    RegionInfo { region: Region::Shanghai, name: "上海", code: "shanghai", province: "上海市" },
    RegionInfo { region: Region::Ningxia, name: "宁夏", code: "ningxia", province: "宁夏回族自治区" },
    RegionInfo { region: Region::Anhui, name: "安徽", code: "anhui", province: "安徽省" },
    RegionInfo { region: Region::Shanxi, name: "山西", code: "shanxi", province: "山西省" },
    RegionInfo { region: Region::Qingdao, name: "青岛", code: "qingdao", province: "山东省" },
    RegionInfo { region: Region::Liaoning, name: "辽宁", code: "liaoning", province: "辽宁省" },
    RegionInfo { region: Region::Xizang, name: "西藏", code: "xizang", province: "西藏自治区" },
    RegionInfo { region: Region::Sichuan, name: "四川", code: "sichuan", province: "四川省" },
    RegionInfo { region: Region::Headquarters, name: "总部", code: "safe", province: "北京市" },
];

impl Region {
    /// Every region, in listing-site order.
    pub fn all() -> impl Iterator<Item = Region> {
        REGIONS.iter().map(|info| info.region)
    }

    fn info(&self) -> &'static RegionInfo {
        // REGIONS holds exactly one entry per variant, in declaration order.
        &REGIONS[*self as usize]
    }

    /// Display name as stored in the `区域` column.
    pub fn name(&self) -> &'static str {
        self.info().name
    }

    /// Site code used in listing URLs and store filenames.
    pub fn code(&self) -> &'static str {
        self.info().code
    }

    /// Province (or municipality / autonomous region) the site belongs to.
    pub fn province(&self) -> &'static str {
        self.info().province
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        REGIONS.iter().find(|i| i.name == name).map(|i| i.region)
    }

    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim();
        REGIONS
            .iter()
            .find(|i| i.code.eq_ignore_ascii_case(code))
            .map(|i| i.region)
    }

    /// Accepts either the display name or the site code.
    pub fn parse(s: &str) -> Option<Self> {
        Self::from_name(s).or_else(|| Self::from_code(s))
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
